//! The coordinate-conversion seam between the navigation core and the host's
//! projection library.
//!
//! The core never links a projection engine itself. The host builds a
//! [`Convertor`] for the map's physical/navigation/public SRS triple and hands
//! it over at construction; everything the controller needs, from SRS-to-SRS
//! point conversion to great-circle math on the navigation ellipsoid, goes
//! through this trait.

use bevy_math::DVec3;
use thiserror::Error;

/// A point could not be converted between two spatial reference systems.
///
/// Conversion failures are recoverable from the core's point of view: a height
/// request that hits one is dropped, nothing else is affected.
#[derive(Debug, Clone, Error)]
#[error("cannot convert point from srs `{from}` to `{to}`")]
pub struct ProjectionError {
    /// Identifier of the source SRS.
    pub from: String,
    /// Identifier of the destination SRS.
    pub to: String,
}

/// Solution of the inverse geodesic problem between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodesic {
    /// Geodesic distance between the two points, in navigation-SRS ground
    /// units (meters on an ellipsoid).
    pub distance: f64,
    /// Forward azimuth at the origin point, degrees clockwise from north.
    pub azi1: f64,
    /// Forward azimuth at the destination point, degrees clockwise from north.
    pub azi2: f64,
}

/// Conversions between the reference frame's spatial reference systems, plus
/// great-circle math used by geographic navigation.
///
/// Points are 3-vectors whose component semantics depend on the SRS: projected
/// x/y/altitude, geographic lon/lat/altitude. Geodesic operations carry the
/// altitude component through unchanged.
pub trait Convertor {
    /// Convert a point from the physical SRS to the navigation SRS.
    fn phys_to_nav(&self, point: DVec3) -> DVec3;

    /// Convert a point from the navigation SRS to the physical SRS.
    fn nav_to_phys(&self, point: DVec3) -> DVec3;

    /// Convert a point between two SRS definitions named in the map config.
    fn convert(&self, point: DVec3, from: &str, to: &str) -> Result<DVec3, ProjectionError>;

    /// Solve the direct geodesic problem: travel `distance` from `origin` at
    /// the given initial `azimuth` (degrees clockwise from north).
    ///
    /// Returns the destination point and the forward azimuth *at the
    /// destination*; the two differ wherever meridians converge, and free-mode
    /// navigation feeds that difference back into the camera yaw.
    fn geo_direct(&self, origin: DVec3, distance: f64, azimuth: f64) -> (DVec3, f64);

    /// Solve the inverse geodesic problem between two points.
    fn geo_inverse(&self, a: DVec3, b: DVec3) -> Geodesic;

    /// Great-circle arc length between two points, in degrees.
    fn geo_arc_dist(&self, a: DVec3, b: DVec3) -> f64;
}
