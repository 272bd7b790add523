//! The tile-tree seam: how the navigation core reads the lazily-loaded
//! terrain quadtree owned by the host's data-loading subsystem.
//!
//! The loader runs on its own threads; the core only ever walks the tree from
//! the tick thread through [`TileTree`] and reacts to the tri-state
//! [`Validity`] of each node. Nothing here blocks: a node that is not loaded
//! yet reports [`Validity::Indeterminate`], the core hints a load with
//! [`TileTree::request`] and retries on a later tick.

use bevy_math::DVec2;
use bevy_reflect::Reflect;
use serde::{Deserialize, Serialize};

/// Load state of a lazily-resolved quantity.
///
/// The states form an absorbing automaton: once a node (or a whole height
/// request) is `Valid` or `Invalid` it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum Validity {
    /// Not resolved yet; retry later.
    Indeterminate,
    /// Resolved and usable.
    Valid,
    /// Resolved and unusable; drop the dependent work.
    Invalid,
}

/// Quadtree tile address: level of detail plus column/row within that level.
///
/// Row `y` grows from the top edge of the division node downward, matching
/// the usual tiled-map convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub struct TileId {
    /// Level of detail; quadtree depth.
    pub lod: u32,
    /// Column index, `0..2^lod` relative to the division root.
    pub x: u32,
    /// Row index, `0..2^lod` relative to the division root.
    pub y: u32,
}

impl TileId {
    /// Create a tile id.
    pub fn new(lod: u32, x: u32, y: u32) -> Self {
        Self { lod, x, y }
    }

    /// The ancestor of this tile at a shallower `lod`.
    ///
    /// Panics in debug builds if `lod` is deeper than this tile's lod.
    pub fn ancestor_at(&self, lod: u32) -> TileId {
        debug_assert!(lod <= self.lod);
        let shift = self.lod - lod;
        TileId {
            lod,
            x: self.x >> shift,
            y: self.y >> shift,
        }
    }

    /// The direct child in quadrant `(dx, dy)`, each in `{0, 1}`.
    pub fn child(&self, dx: u32, dy: u32) -> TileId {
        TileId {
            lod: self.lod + 1,
            x: self.x << 1 | (dx & 1),
            y: self.y << 1 | (dy & 1),
        }
    }

    /// Whether this tile is an ancestor of (or equal to) `other`.
    pub fn contains(&self, other: TileId) -> bool {
        other.lod >= self.lod && other.ancestor_at(self.lod) == *self
    }
}

/// Axis-aligned extents in a tile's SRS plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extents2 {
    /// Lower-left corner.
    pub ll: DVec2,
    /// Upper-right corner.
    pub ur: DVec2,
}

impl Extents2 {
    /// Create extents from lower-left and upper-right corners.
    pub fn new(ll: DVec2, ur: DVec2) -> Self {
        Self { ll, ur }
    }

    /// Center point.
    pub fn center(&self) -> DVec2 {
        (self.ll + self.ur) * 0.5
    }

    /// Per-axis dimensions.
    pub fn dimensions(&self) -> DVec2 {
        self.ur - self.ll
    }

    /// The larger of the two dimensions; the "size" of a square-ish tile.
    pub fn size(&self) -> f64 {
        self.dimensions().max_element()
    }

    /// Whether `point` lies inside, boundary included.
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.ll.x && point.x <= self.ur.x && point.y >= self.ll.y && point.y <= self.ur.y
    }
}

/// Spatial metadata of one quadtree tile: the SRS it is meshed in, its
/// address, and its extents in that SRS.
///
/// Derived purely from the reference-frame division; carries no load state.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    /// Identifier of the SRS the tile's extents are expressed in.
    pub srs: String,
    /// Tile address.
    pub id: TileId,
    /// Tile extents in `srs`.
    pub extents: Extents2,
}

impl NodeInfo {
    /// Whether `point` (in this tile's SRS) lies inside the tile.
    pub fn inside(&self, point: DVec2) -> bool {
        self.extents.contains(point)
    }

    /// Metadata of the direct child in quadrant `(dx, dy)`.
    ///
    /// Tile rows grow downward, so `dy = 0` takes the upper half of the
    /// extents and `dy = 1` the lower half.
    pub fn child(&self, dx: u32, dy: u32) -> NodeInfo {
        let center = self.extents.center();
        let x = if dx == 0 {
            (self.extents.ll.x, center.x)
        } else {
            (center.x, self.extents.ur.x)
        };
        let y = if dy == 0 {
            (center.y, self.extents.ur.y)
        } else {
            (self.extents.ll.y, center.y)
        };
        NodeInfo {
            srs: self.srs.clone(),
            id: self.id.child(dx, dy),
            extents: Extents2::new(DVec2::new(x.0, y.0), DVec2::new(x.1, y.1)),
        }
    }

    /// The direct child whose extents contain `point`, if any.
    ///
    /// Boundary points can lie in two children; the first quadrant in
    /// `(0,0), (1,0), (0,1), (1,1)` order wins.
    pub fn child_containing(&self, point: DVec2) -> Option<NodeInfo> {
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let child = self.child(dx, dy);
            if child.inside(point) {
                return Some(child);
            }
        }
        None
    }
}

/// One node of the host's traversal tree.
///
/// Implementations are shared with the loader threads and are responsible for
/// their own synchronization; every method here must be callable from the
/// tick thread without blocking.
pub trait TraverseNode {
    /// Load state of this node.
    fn validity(&self) -> Validity;

    /// Tile address of this node.
    fn id(&self) -> TileId;

    /// Whether this node has no children (bottom of the loaded tree).
    fn is_leaf(&self) -> bool;

    /// The direct child with the given tile id, if present.
    fn find_child(&self, id: TileId) -> Option<&Self>;

    /// The node's surrogate elevation: a single representative height used
    /// before full heightmap resolution. `None` when the tile carries no
    /// usable surrogate.
    fn surrogate(&self) -> Option<f64>;
}

/// The lazily-loaded terrain quadtree, owned by the host.
pub trait TileTree {
    /// Node handle type.
    type Node: TraverseNode;

    /// The tree root; `None` until the root tile has been fetched.
    fn root(&self) -> Option<&Self::Node>;

    /// Hint that `node` should be loaded with priority.
    ///
    /// Called for nodes that report [`Validity::Indeterminate`]; the tree is
    /// expected to schedule the load and make progress between ticks.
    fn request(&self, node: &Self::Node);
}
