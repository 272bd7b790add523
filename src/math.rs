//! Small angle and interpolation helpers shared by the controller.
//!
//! All angles are degrees unless a function says otherwise; rotation matrices
//! are built in f64 because navigation math accumulates over many ticks.

use bevy_math::{DMat3, DVec3};

/// Non-negative remainder of `value / period`.
///
/// Unlike the `%` operator, the result is always in `[0, period)` for a
/// positive period, which is what angle and periodicity wrapping need.
pub fn modulo(value: f64, period: f64) -> f64 {
    let rem = value % period;
    if rem < 0.0 {
        rem + period
    } else {
        rem
    }
}

/// Wraps an angle into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    modulo(angle, 360.0)
}

/// Shortest signed rotation from `a` to `b`, in `(-180, 180]`.
pub fn angular_diff(a: f64, b: f64) -> f64 {
    let diff = modulo(b - a, 360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Componentwise [`angular_diff`] over Euler angle triples.
pub fn angular_diff_vec(a: DVec3, b: DVec3) -> DVec3 {
    DVec3::new(
        angular_diff(a.x, b.x),
        angular_diff(a.y, b.y),
        angular_diff(a.z, b.z),
    )
}

/// Linear interpolation between `a` and `b` by `t`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Rotation about the x axis by `degrees`.
pub fn rotation_x(degrees: f64) -> DMat3 {
    DMat3::from_rotation_x(degrees.to_radians())
}

/// Rotation about the y axis by `degrees`.
pub fn rotation_y(degrees: f64) -> DMat3 {
    DMat3::from_rotation_y(degrees.to_radians())
}

/// Rotation about the z axis by `degrees`.
pub fn rotation_z(degrees: f64) -> DMat3 {
    DMat3::from_rotation_z(degrees.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn modulo_is_non_negative() {
        assert_relative_eq!(modulo(-30.0, 360.0), 330.0);
        assert_relative_eq!(modulo(370.0, 360.0), 10.0);
        assert_relative_eq!(modulo(0.0, 360.0), 0.0);
    }

    #[test]
    fn normalize_angle_range() {
        assert_relative_eq!(normalize_angle(-90.0), 270.0);
        assert_relative_eq!(normalize_angle(720.0), 0.0);
        assert!(normalize_angle(359.999) < 360.0);
    }

    #[test]
    fn angular_diff_takes_shortest_path() {
        assert_relative_eq!(angular_diff(10.0, 350.0), -20.0);
        assert_relative_eq!(angular_diff(350.0, 10.0), 20.0);
        assert_relative_eq!(angular_diff(0.0, 180.0), 180.0);
        assert_relative_eq!(angular_diff(0.0, 181.0), -179.0);
    }

    #[test]
    fn rotation_z_turns_north_to_west() {
        // +90 degrees about z carries +y onto -x in a right-handed frame.
        let v = rotation_z(90.0) * DVec3::Y;
        assert_relative_eq!(v.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
    }
}
