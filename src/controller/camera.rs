//! Deriving the render camera from the navigation position.
//!
//! The position lives in the navigation SRS; the renderer wants an eye point
//! and a view basis in the physical SRS. Projected frames get there by an
//! axis swap; geographic frames build a north-east-down basis at the ground
//! point from two short geodesic probes and rotate the camera vectors into
//! it.

use bevy_math::{DMat3, DVec3};

use crate::config::{MapConfig, PositionKind, SrsType};
use crate::convertor::Convertor;
use crate::math::{rotation_x, rotation_y, rotation_z};

/// Distance of the north/east probe points used to build the geographic
/// basis, in navigation ground units.
const BASIS_PROBE_DISTANCE: f64 = 100.0;

/// The camera in physical-SRS terms: an eye (or orbit-center) point and a
/// view basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// The positioned point: the orbit center for objective positions, the
    /// eye for subjective ones.
    pub center: DVec3,
    /// Unit view direction.
    pub dir: DVec3,
    /// Unit up vector.
    pub up: DVec3,
}

/// Distance between the camera eye and the orbit center implied by the
/// view extent and the field of view.
pub(crate) fn objective_distance(map: &MapConfig) -> f64 {
    let pos = &map.position;
    pos.view_extent * 0.5 / (pos.fov * 0.5).to_radians().tan()
}

/// Derive the physical-SRS camera pose from the current position.
///
/// `nav_kind` is the validated navigation SRS type; cartesian never gets
/// here.
pub(crate) fn position_to_camera<C: Convertor>(
    map: &MapConfig,
    convertor: &C,
    nav_kind: SrsType,
) -> CameraPose {
    let pos = &map.position;
    let rot = pos.orientation;
    let mut center = pos.point;

    // Camera-space view vectors, before orientation.
    let mut dir = DVec3::new(1.0, 0.0, 0.0);
    let mut up = DVec3::new(0.0, 0.0, -1.0);

    // Yaw winds the opposite way in geographic frames, where "x" is
    // longitude rather than easting.
    let yaw = match nav_kind {
        SrsType::Projected => rot.x,
        _ => -rot.x,
    };
    let orientation = rotation_z(yaw) * rotation_y(-rot.y) * rotation_x(-rot.z);
    dir = orientation * dir;
    up = orientation * up;

    match nav_kind {
        SrsType::Projected => {
            // Navigation x/y are northing/easting relative to the physical
            // frame's east/north, and altitude runs opposite the camera z.
            dir = DVec3::new(dir.y, dir.x, -dir.z);
            up = DVec3::new(up.y, up.x, -up.z);
            let dir_point = convertor.nav_to_phys(center + dir);
            let up_point = convertor.nav_to_phys(center + up);
            center = convertor.nav_to_phys(center);
            CameraPose {
                center,
                dir: (dir_point - center).normalize(),
                up: (up_point - center).normalize(),
            }
        }
        SrsType::Geographic | SrsType::Cartesian => {
            // North-east-down basis at the ground point, from two probe
            // points a short geodesic hop away.
            let (north_point, _) = convertor.geo_direct(center, BASIS_PROBE_DISTANCE, 0.0);
            let (east_point, _) = convertor.geo_direct(center, BASIS_PROBE_DISTANCE, 90.0);
            center = convertor.nav_to_phys(center);
            let north = (convertor.nav_to_phys(north_point) - center).normalize();
            let east = (convertor.nav_to_phys(east_point) - center).normalize();
            let down = north.cross(east).normalize();
            let east = north.cross(down).normalize();
            let ned = DMat3::from_cols(north, east, down);
            CameraPose {
                center,
                dir: (ned * dir).normalize(),
                up: (ned * up).normalize(),
            }
        }
    }
}

/// Translate the position between the objective and subjective conventions
/// and flip its kind.
///
/// The two are the same camera described from opposite ends of the view ray,
/// `objective_distance` apart; converting twice round-trips.
pub(crate) fn convert_position_subj_obj<C: Convertor>(
    map: &mut MapConfig,
    convertor: &C,
    nav_kind: SrsType,
) {
    let pose = position_to_camera(map, convertor, nav_kind);
    let mut dist = objective_distance(map);
    if map.position.kind == PositionKind::Objective {
        dist = -dist;
    }
    let center = pose.center + pose.dir * dist;
    map.position.point = convertor.phys_to_nav(center);
    map.position.kind = match map.position.kind {
        PositionKind::Objective => PositionKind::Subjective,
        PositionKind::Subjective => PositionKind::Objective,
    };
}
