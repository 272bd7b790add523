//! The per-tick motion solver.
//!
//! Each tick the controller measures how far the camera still is from its
//! targets (horizontal ground distance, vertical altitude difference,
//! residual rotation, view-extent difference) and asks the solver how much
//! of each to consume this tick. The answer depends on the active
//! [`NavigationType`] profile.
//!
//! All profiles share two contracts: residuals approach zero monotonically
//! (the fly-over view extent excepted, which arcs up before it comes down),
//! and zero residuals in means zero motion out.

use bevy_math::DVec3;

use crate::config::{NavigationSettings, NavigationType};

/// Reference tick rate the inertia coefficients are calibrated against.
const REFERENCE_RATE: f64 = 60.0;

/// How far the fly-over profile lets the camera travel per tick, as a
/// fraction of the current view extent at the reference rate.
const FLY_OVER_SCREEN_SPEED: f64 = 0.5;

/// One tick's worth of motion, as produced by [`solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionStep {
    /// New view extent, committed to the position.
    pub view_extent: f64,
    /// Distance to travel along the ground toward the target, in the same
    /// units as the horizontal residual.
    pub horizontal: f64,
    /// Altitude change.
    pub vertical: f64,
    /// New orientation; the consumed rotation is `orientation - current`.
    pub orientation: DVec3,
}

/// Fraction of a residual consumed in `timestep` seconds under an inertia
/// coefficient calibrated for one reference-rate tick.
fn approach(inertia: f64, timestep: f64) -> f64 {
    1.0 - inertia.powf(timestep * REFERENCE_RATE)
}

/// Map the remaining residuals onto this tick's motion.
///
/// `horizontal` and `vertical` are signed residuals toward the target
/// (horizontal is a non-negative distance), `view_extent_change` is
/// `target - current`, and `change_rotation` is the Euler rotation still to
/// be consumed.
#[allow(clippy::too_many_arguments)]
pub(crate) fn solve(
    settings: &NavigationSettings,
    nav_type: NavigationType,
    timestep: f64,
    fov: f64,
    horizontal: f64,
    vertical: f64,
    view_extent: f64,
    view_extent_change: f64,
    orientation: DVec3,
    change_rotation: DVec3,
) -> MotionStep {
    match nav_type {
        NavigationType::Instant => MotionStep {
            view_extent: view_extent + view_extent_change,
            horizontal,
            vertical,
            orientation: orientation + change_rotation,
        },
        NavigationType::Quick => {
            let pan = approach(settings.inertia.pan, timestep);
            MotionStep {
                view_extent: view_extent
                    + view_extent_change * approach(settings.inertia.zoom, timestep),
                horizontal: horizontal * pan,
                vertical: vertical * pan,
                orientation: orientation
                    + change_rotation * approach(settings.inertia.rotate, timestep),
            }
        }
        NavigationType::FlyOver => {
            let pan = approach(settings.inertia.pan, timestep);
            let zoom = approach(settings.inertia.zoom, timestep);

            // While the target is more than a screen away, climb toward an
            // apex extent wide enough to show the remaining trip; once close,
            // descend to the real target extent. Widening the fov shortens
            // the apex, since more ground fits the frame already.
            let target_extent = view_extent + view_extent_change;
            let apex = target_extent.max(horizontal * 45.0 / fov.max(1.0));
            let phase_target = if horizontal > view_extent {
                apex
            } else {
                target_extent
            };

            // Ground speed tied to the current extent keeps the apparent
            // motion constant across the arc.
            let max_ground_step = view_extent * FLY_OVER_SCREEN_SPEED * timestep * REFERENCE_RATE;

            MotionStep {
                view_extent: view_extent + (phase_target - view_extent) * zoom,
                horizontal: (horizontal * pan).min(max_ground_step),
                vertical: vertical * pan,
                orientation: orientation
                    + change_rotation * approach(settings.inertia.rotate, timestep),
            }
        }
    }
}
