//! Map configuration and navigation settings.
//!
//! [`MapConfig`] is the slice of the host's map configuration the navigation
//! core consumes: the reference-frame SRS triple and division, the SRS
//! registry, and the persistent camera [`Position`]. [`NavigationSettings`]
//! holds the tuning knobs. Both are handed to the core at construction and
//! are immutable afterwards, except for the embedded `Position`, which the
//! core owns and advances every tick.

use std::collections::HashMap;

use bevy_math::DVec3;
use bevy_reflect::Reflect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tiles::{Extents2, NodeInfo, TileId};

/// A contract violation by the host, detected when the core is constructed.
///
/// Everything else the core can encounter at runtime (unresolvable height
/// requests, pending tiles, rejected gestures) is handled silently inside
/// the tick; only misconfiguration is an error.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// The navigation SRS named by the reference frame is missing from the
    /// SRS registry.
    #[error("navigation srs `{0}` is not declared in the srs registry")]
    UnknownNavigationSrs(String),
    /// Navigation cannot run in a cartesian (ECEF) frame.
    #[error("navigation srs must be projected or geographic, not cartesian")]
    CartesianNavigationSrs,
    /// An inertia coefficient is outside `[0, 1)`.
    #[error("inertia coefficient `{name}` is {value}, must be in [0, 1)")]
    InertiaOutOfRange {
        /// Which coefficient.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The azimuthal latitude threshold is outside `(0, 90)`.
    #[error("latitude threshold is {0}, must be in (0, 90) degrees")]
    LatitudeThresholdOutOfRange(f64),
}

/// Classification of a spatial reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrsType {
    /// Planar coordinates: x/y/altitude.
    Projected,
    /// Lon/lat on an ellipsoid, plus altitude.
    Geographic,
    /// Earth-centered cartesian. Valid as a physical SRS only.
    Cartesian,
}

/// Axis a projected SRS wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodicAxis {
    /// Wrap the x coordinate.
    X,
    /// Wrap the y coordinate.
    Y,
}

/// Declared periodicity of a projected SRS.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Periodicity {
    /// Which axis wraps.
    pub axis: PeriodicAxis,
    /// Wrap period in SRS units; positions wrap into `[-period/2, period/2)`.
    pub period: f64,
}

/// One entry of the SRS registry.
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Srs {
    /// What kind of coordinate system this is.
    pub kind: SrsType,
    /// Periodicity declaration, for projected systems that wrap.
    pub periodicity: Option<Periodicity>,
}

/// Whether a position's altitude is anchored to the terrain or absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightMode {
    /// Altitude is absolute in the navigation SRS.
    Fixed,
    /// Altitude was supplied relative to the terrain and must be re-grounded
    /// on the next tick; the tick flips it back to `Fixed`.
    Floating,
}

/// Viewpoint convention of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    /// The ground point is the center of orbit; the camera looks at it.
    Objective,
    /// The ground point is the eye; first-person view from it.
    Subjective,
}

/// The persistent camera descriptor.
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Position {
    /// Camera ground point in the navigation SRS. Projected: x/y/altitude;
    /// geographic: lon/lat/altitude.
    pub point: DVec3,
    /// Euler angles (yaw, pitch, roll), each normalized into `[0, 360)`.
    pub orientation: DVec3,
    /// Vertical world-units visible at image center; the zoom proxy.
    pub view_extent: f64,
    /// Vertical field of view, degrees.
    pub fov: f64,
    /// Altitude anchoring mode.
    pub height_mode: HeightMode,
    /// Viewpoint convention.
    pub kind: PositionKind,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            point: DVec3::ZERO,
            orientation: DVec3::new(0.0, 270.0, 0.0),
            view_extent: 1000.0,
            fov: 45.0,
            height_mode: HeightMode::Fixed,
            kind: PositionKind::Objective,
        }
    }
}

/// How a division node splits into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partitioning {
    /// Regular quadtree bisection; the only mode navigation can sample.
    Bisection,
    /// Irregular, externally-defined split.
    Manual,
}

/// One root of the reference frame's spatial division.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivisionNode {
    /// Root tile address of this subtree.
    pub id: TileId,
    /// SRS the subtree is meshed in.
    pub srs: String,
    /// Extents of the root tile in `srs`.
    pub extents: Extents2,
    /// Partitioning mode below this node.
    pub partitioning: Partitioning,
}

/// The reference frame: which SRS plays which role, and how the planet is
/// divided into tile subtrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    /// SRS of the rendered scene geometry.
    pub physical_srs: String,
    /// SRS of [`Position::point`].
    pub navigation_srs: String,
    /// SRS exposed to API users; unused by the core but part of the triple
    /// the convertor is built from.
    pub public_srs: String,
    /// Division roots.
    pub division: Vec<DivisionNode>,
}

impl ReferenceFrame {
    /// Spatial metadata of an arbitrary tile, derived by bisecting the
    /// division root that contains it.
    ///
    /// Returns `None` when no bisectional division root is an ancestor of
    /// `id`.
    pub fn node_info(&self, id: TileId) -> Option<NodeInfo> {
        let root = self.division.iter().find(|node| {
            node.partitioning == Partitioning::Bisection && node.id.contains(id)
        })?;
        let mut info = NodeInfo {
            srs: root.srs.clone(),
            id: root.id,
            extents: root.extents,
        };
        for lod in root.id.lod..id.lod {
            let next = id.ancestor_at(lod + 1);
            info = info.child(next.x & 1, next.y & 1);
        }
        Some(info)
    }
}

/// The slice of the host's map configuration the navigation core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Reference frame.
    pub reference_frame: ReferenceFrame,
    /// SRS registry, keyed by the identifiers the reference frame uses.
    pub srs: HashMap<String, Srs>,
    /// Persistent camera position; owned and advanced by the core.
    pub position: Position,
    /// Additive yaw velocity per tick, from the browser options. Zero means
    /// no auto-rotation.
    pub auto_rotate: f64,
}

impl MapConfig {
    /// The navigation SRS registry entry, if declared.
    pub fn navigation_srs(&self) -> Option<&Srs> {
        self.srs.get(&self.reference_frame.navigation_srs)
    }
}

/// Per-axis inertia coefficients for the `Quick` and `FlyOver` motion
/// profiles.
///
/// Each coefficient is in `[0, 1)`: the fraction of the remaining distance
/// *kept* after one tick at the 60 Hz reference rate. Zero snaps, values near
/// one glide.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Inertia {
    /// Horizontal and vertical position motion.
    pub pan: f64,
    /// Orientation motion.
    pub rotate: f64,
    /// View-extent (zoom) motion.
    pub zoom: f64,
}

impl Default for Inertia {
    fn default() -> Self {
        Self {
            pan: 0.9,
            rotate: 0.9,
            zoom: 0.9,
        }
    }
}

/// Input sensitivity multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Sensitivity {
    /// Pan gesture multiplier.
    pub pan: f64,
    /// Rotate gesture multiplier.
    pub rotate: f64,
    /// Zoom gesture multiplier.
    pub zoom: f64,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            pan: 1.0,
            rotate: 1.0,
            zoom: 1.0,
        }
    }
}

/// Bounds on the view extent; the zoom limits.
///
/// The target view extent is clamped into `[min, max]` every tick, so gesture
/// handlers never need to bound-check their own zoom math.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct ViewExtentLimits {
    /// Smallest visible vertical extent; how far in the user can zoom.
    pub min: f64,
    /// Largest visible vertical extent; how far out the user can zoom.
    pub max: f64,
}

impl Default for ViewExtentLimits {
    fn default() -> Self {
        Self {
            min: 75.0,
            max: 1.0e7,
        }
    }
}

/// Configured geographic navigation mode.
///
/// This is the host's *intent*; the mode the solver actually runs under is
/// the core's resolved [`GeographicMode`](crate::controller::GeographicMode),
/// which is never `Dynamic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeographicNavMode {
    /// North stays up; latitude is clamped away from the poles.
    Azimuthal,
    /// Unconstrained great-circle motion; heading drifts with the geodesic.
    Free,
    /// Azimuthal away from the poles, promoted to free near them.
    Dynamic,
}

/// Motion profile of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    /// Reach the target in a single tick.
    Instant,
    /// Exponential approach; each tick closes a fixed fraction of the rest.
    Quick,
    /// Zoom-out-then-in arc for long horizontal trips.
    FlyOver,
}

/// Tuning knobs of the navigation core.
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct NavigationSettings {
    /// Inertia coefficients, each in `[0, 1)`.
    pub inertia: Inertia,
    /// Gesture sensitivity multipliers.
    pub sensitivity: Sensitivity,
    /// Zoom bounds.
    pub view_extent_limits: ViewExtentLimits,
    /// Terrain-sampling density: how many height samples the resolver aims
    /// for across one view extent. Controls the lod it descends to.
    pub samples_per_view_extent: f64,
    /// Latitude beyond which azimuthal navigation clamps, and dynamic mode
    /// promotes to free, in `(0, 90)` degrees.
    pub latitude_threshold: f64,
    /// Configured geographic mode.
    pub geographic_mode: GeographicNavMode,
    /// Motion profile direct-manipulation gestures reset to.
    pub navigation_type: NavigationType,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            inertia: Inertia::default(),
            sensitivity: Sensitivity::default(),
            view_extent_limits: ViewExtentLimits::default(),
            samples_per_view_extent: 8.0,
            latitude_threshold: 80.0,
            geographic_mode: GeographicNavMode::Dynamic,
            navigation_type: NavigationType::Quick,
        }
    }
}

impl NavigationSettings {
    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("pan", self.inertia.pan),
            ("rotate", self.inertia.rotate),
            ("zoom", self.inertia.zoom),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(DomainError::InertiaOutOfRange { name, value });
            }
        }
        if !(self.latitude_threshold > 0.0 && self.latitude_threshold < 90.0) {
            return Err(DomainError::LatitudeThresholdOutOfRange(
                self.latitude_threshold,
            ));
        }
        Ok(())
    }
}
