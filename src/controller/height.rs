//! Lazy terrain-height resolution.
//!
//! The camera's target altitude follows the terrain underneath it, but the
//! terrain arrives asynchronously: elevation surrogates live on quadtree
//! tiles that load on their own threads. A [`HeightRequest`] captures a
//! ground point and makes incremental progress every tick, without ever
//! blocking: locate the tile to sample, walk the loaded tree toward the four
//! corner tiles around the point, and finally blend their surrogates. Any
//! tile that is not loaded yet parks the whole request until a later tick.

use bevy_math::{DVec2, DVec3};
use tracing::trace;

use crate::config::{MapConfig, NavigationSettings, Partitioning};
use crate::convertor::Convertor;
use crate::math::lerp;
use crate::tiles::{NodeInfo, TileId, TileTree, TraverseNode, Validity};

/// Counters the resolver keeps for the host's diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationStats {
    /// Lod of the most recently located height request.
    pub last_height_request_lod: Option<u32>,
    /// Requests that produced a height.
    pub height_requests_resolved: u64,
    /// Requests that were dropped as unsatisfiable.
    pub height_requests_failed: u64,
}

/// Outcome of one processing step of a [`HeightRequest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Resolution {
    /// Some contributing tile is still loading; keep the request queued.
    Pending,
    /// The request cannot be satisfied; drop it.
    Failed,
    /// Terrain height at the requested point, in the navigation SRS.
    Done(f64),
}

/// Resolution state of one corner tile.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CornerState {
    Pending,
    Resolved(f64),
    Failed,
}

/// A cursor resolving the surrogate elevation of one corner tile.
///
/// Re-walks the loaded tree from the root on every call; the only state kept
/// across ticks is the target id and the terminal outcome, so the request
/// never holds a borrow into the tree.
#[derive(Debug, Clone)]
struct CornerRequest {
    target: TileId,
    state: CornerState,
}

impl CornerRequest {
    fn new(target: TileId) -> Self {
        Self {
            target,
            state: CornerState::Pending,
        }
    }

    fn process<T: TileTree>(&mut self, tree: &T) -> Validity {
        match self.state {
            CornerState::Resolved(_) => return Validity::Valid,
            CornerState::Failed => return Validity::Invalid,
            CornerState::Pending => {}
        }

        let Some(mut node) = tree.root() else {
            return Validity::Indeterminate;
        };
        loop {
            match node.validity() {
                Validity::Invalid => {
                    self.state = CornerState::Failed;
                    return Validity::Invalid;
                }
                Validity::Indeterminate => {
                    tree.request(node);
                    return Validity::Indeterminate;
                }
                Validity::Valid => {}
            }

            // The deepest loaded ancestor stands in for the target tile.
            if node.id() == self.target || node.is_leaf() {
                return match node.surrogate() {
                    Some(height) => {
                        self.state = CornerState::Resolved(height);
                        Validity::Valid
                    }
                    None => {
                        self.state = CornerState::Failed;
                        Validity::Invalid
                    }
                };
            }

            if node.id().lod >= self.target.lod {
                // Diverged from the target's ancestor path; the corner tile
                // does not exist in this tree.
                self.state = CornerState::Failed;
                return Validity::Invalid;
            }
            let next = self.target.ancestor_at(node.id().lod + 1);
            match node.find_child(next) {
                Some(child) => node = child,
                None => {
                    self.state = CornerState::Failed;
                    return Validity::Invalid;
                }
            }
        }
    }

    fn resolved(&self) -> f64 {
        match self.state {
            CornerState::Resolved(height) => height,
            _ => unreachable!("corner read before resolution"),
        }
    }
}

/// Work located on the first successful processing step.
#[derive(Debug, Clone)]
struct Located {
    node_info: NodeInfo,
    sds_xy: DVec2,
    interp: DVec2,
    corners: [CornerRequest; 4],
}

/// A pending terrain-height query at one ground point.
#[derive(Debug, Clone)]
pub(crate) struct HeightRequest {
    nav_xy: DVec2,
    reset_offset: Option<f64>,
    located: Option<Located>,
}

impl HeightRequest {
    /// A relative request: the resolved height adjusts the target altitude
    /// by its difference from the previous sample.
    pub fn new(nav_xy: DVec2) -> Self {
        Self {
            nav_xy,
            reset_offset: None,
            located: None,
        }
    }

    /// An absolute request: the resolved height replaces the target
    /// altitude, plus `offset`.
    pub fn absolute(nav_xy: DVec2, offset: f64) -> Self {
        Self {
            nav_xy,
            reset_offset: Some(offset),
            located: None,
        }
    }

    pub fn reset_offset(&self) -> Option<f64> {
        self.reset_offset
    }

    /// Make one non-blocking step of progress.
    pub fn process<C: Convertor, T: TileTree>(
        &mut self,
        map: &MapConfig,
        settings: &NavigationSettings,
        convertor: &C,
        tree: &T,
        stats: &mut NavigationStats,
    ) -> Resolution {
        if self.located.is_none() {
            let Some(located) = self.locate(map, settings, convertor) else {
                return Resolution::Failed;
            };
            stats.last_height_request_lod = Some(located.node_info.id.lod);
            self.located = Some(located);
        }
        let Some(located) = self.located.as_mut() else {
            return Resolution::Failed;
        };

        let mut all = Validity::Valid;
        for corner in &mut located.corners {
            match corner.process(tree) {
                Validity::Invalid => return Resolution::Failed,
                Validity::Indeterminate => all = Validity::Indeterminate,
                Validity::Valid => {}
            }
        }
        if all == Validity::Indeterminate {
            return Resolution::Pending;
        }

        let (ix, iy) = (located.interp.x, located.interp.y);
        debug_assert!((0.0..=1.0).contains(&ix) && (0.0..=1.0).contains(&iy));
        let c = &located.corners;
        let height = lerp(
            lerp(c[2].resolved(), c[3].resolved(), ix),
            lerp(c[0].resolved(), c[1].resolved(), ix),
            iy,
        );

        let sampled = DVec3::new(located.sds_xy.x, located.sds_xy.y, height);
        match convertor.convert(
            sampled,
            &located.node_info.srs,
            &map.reference_frame.navigation_srs,
        ) {
            Ok(nav_point) => Resolution::Done(nav_point.z),
            Err(err) => {
                trace!("height request dropped: {err}");
                Resolution::Failed
            }
        }
    }

    /// Find the tile to sample and set up the four corner cursors.
    fn locate<C: Convertor>(
        &self,
        map: &MapConfig,
        settings: &NavigationSettings,
        convertor: &C,
    ) -> Option<Located> {
        let (root, sds_xy) = self.find_nav_root(map, convertor)?;
        let node_info = Self::descend_sampled(
            root,
            sds_xy,
            settings.samples_per_view_extent,
            map.position.view_extent,
        );

        // Bilinear setup around the corner of the located tile nearest the
        // sample point. Tile rows grow downward, so the y cases mirror the
        // x cases.
        let center = node_info.extents.center();
        let size = node_info.extents.dimensions();
        let mut interp = (sds_xy - center) / size;
        let mut corner = node_info.id;
        if sds_xy.x < center.x {
            corner.x = corner.x.checked_sub(1)?;
            interp.x += 1.0;
        }
        if sds_xy.y < center.y {
            interp.y += 1.0;
        } else {
            corner.y = corner.y.checked_sub(1)?;
        }

        let corner_id = |i: u32| TileId::new(corner.lod, corner.x + i % 2, corner.y + i / 2);
        let corners = [
            CornerRequest::new(corner_id(0)),
            CornerRequest::new(corner_id(1)),
            CornerRequest::new(corner_id(2)),
            CornerRequest::new(corner_id(3)),
        ];

        Some(Located {
            node_info,
            sds_xy,
            interp,
            corners,
        })
    }

    /// The division root containing the requested point, and the point
    /// converted into that root's SRS.
    fn find_nav_root<C: Convertor>(
        &self,
        map: &MapConfig,
        convertor: &C,
    ) -> Option<(NodeInfo, DVec2)> {
        for node in &map.reference_frame.division {
            if node.partitioning != Partitioning::Bisection {
                continue;
            }
            let Ok(converted) = convertor.convert(
                DVec3::new(self.nav_xy.x, self.nav_xy.y, 0.0),
                &map.reference_frame.navigation_srs,
                &node.srs,
            ) else {
                continue;
            };
            let sds = DVec2::new(converted.x, converted.y);
            let info = NodeInfo {
                srs: node.srs.clone(),
                id: node.id,
                extents: node.extents,
            };
            if info.inside(sds) {
                return Some((info, sds));
            }
        }
        trace!("height request outside every navigation root");
        None
    }

    /// Descend while the tile is still coarser than the sampling density
    /// asks for at the current zoom.
    fn descend_sampled(
        mut info: NodeInfo,
        sds_xy: DVec2,
        samples_per_view_extent: f64,
        view_extent: f64,
    ) -> NodeInfo {
        loop {
            let desire = (samples_per_view_extent * info.extents.size() / view_extent).log2();
            if desire < 3.0 {
                return info;
            }
            match info.child_containing(sds_xy) {
                Some(child) => info = child,
                None => return info,
            }
        }
    }
}
