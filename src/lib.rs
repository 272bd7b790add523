//! Navigation core for interactive planet-scale tiled terrain viewers.
//!
//! `terra_nav` turns pan/rotate/zoom gestures into a smoothly animated
//! camera trajectory over a tiled planet, while continuously re-grounding
//! the camera's altitude on terrain that loads lazily underneath it. It is
//! the piece of a map viewer that sits between the input layer and the
//! renderer: no rendering, no networking, no event loop, just the moving
//! camera.
//!
//! The host supplies three things:
//!
//! - a [`MapConfig`](config::MapConfig): the reference-frame SRS triple, the
//!   tile division, the SRS registry, and the starting camera
//!   [`Position`](config::Position);
//! - a [`Convertor`](convertor::Convertor): the projection library doing
//!   SRS conversions and great-circle math;
//! - a [`TileTree`](tiles::TileTree): read access to the lazily-loaded
//!   terrain quadtree, shared with the loader threads.
//!
//! and drives the core from its frame loop:
//!
//! ```ignore
//! let mut nav = Navigation::new(map_config, NavigationSettings::default(), convertor)?;
//!
//! // per frame, on the map tick thread:
//! nav.pan(drag_delta);
//! nav.update(&tile_tree, frame_dt);
//! let pose = nav.position_to_camera();
//! ```
//!
//! The same controller logic runs in projected (planar) and geographic
//! (lon/lat) navigation frames; geographic frames additionally switch
//! between azimuthal (north-up) and free (great-circle) motion near the
//! poles. Everything is single-threaded and non-blocking: a tick never
//! waits for tile data, it just tries again next frame.

pub mod config;
pub mod controller;
pub mod convertor;
pub mod math;
pub mod tiles;

pub use controller::Navigation;

/// Common imports for hosts embedding the navigation core.
pub mod prelude {
    pub use crate::config::{
        DivisionNode, DomainError, GeographicNavMode, HeightMode, Inertia, MapConfig,
        NavigationSettings, NavigationType, Partitioning, PeriodicAxis, Periodicity, Position,
        PositionKind, ReferenceFrame, Sensitivity, Srs, SrsType, ViewExtentLimits,
    };
    pub use crate::controller::{CameraPose, GeographicMode, Navigation, NavigationStats};
    pub use crate::convertor::{Convertor, Geodesic, ProjectionError};
    pub use crate::tiles::{Extents2, NodeInfo, TileId, TileTree, TraverseNode, Validity};
}
