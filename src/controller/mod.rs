//! The navigation controller: gesture handling, the mode machine, and the
//! per-tick update that moves the camera.
//!
//! All gestures mutate *targets*; the camera itself only ever moves inside
//! [`Navigation::update`], which the host calls once per frame from the map
//! tick thread. Each tick advances the pending terrain-height query one
//! step, resolves the mode machine, runs the motion solver against the
//! remaining residuals, and applies the resulting step with SRS-appropriate
//! arithmetic: straight lines in projected frames, geodesics in geographic
//! ones.

use std::collections::VecDeque;
use std::time::Duration;

use bevy_math::DVec3;
use bevy_reflect::Reflect;
use tracing::debug;

use crate::config::{
    DomainError, GeographicNavMode, HeightMode, MapConfig, NavigationSettings, NavigationType,
    PeriodicAxis, Periodicity, Position, SrsType,
};
use crate::convertor::Convertor;
use crate::math::{angular_diff, angular_diff_vec, modulo, normalize_angle, rotation_z};
use crate::tiles::TileTree;

pub mod camera;
pub mod height;
mod solver;

pub use camera::CameraPose;
pub use height::NavigationStats;

use height::{HeightRequest, Resolution};

/// Pitch stays in this interval: 270 is straight down, 350 almost level.
const PITCH_LIMITS: (f64, f64) = (270.0, 350.0);

/// Pans that would jump the target more than this many degrees are dropped;
/// they are artifacts of geodesic math degenerating near the poles.
const PAN_REJECT_THRESHOLD: f64 = 150.0;

/// Margin under the latitude threshold at which dynamic mode promotes to
/// free, absorbing the clamp's own rounding.
const LATITUDE_EPSILON: f64 = 1e-5;

/// Height queue capacity: one request possibly in flight plus one pending.
const HEIGHT_QUEUE_LEN: usize = 2;

/// The geographic mode the solver actually runs under.
///
/// Unlike the configured [`GeographicNavMode`], this can never be `Dynamic`:
/// the dynamic intent is resolved into one of these at tick start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum GeographicMode {
    /// North stays up; motion interpolates lon/lat independently.
    Azimuthal,
    /// Motion follows great circles; heading drifts with the geodesic.
    Free,
}

/// The navigation core.
///
/// Owns the map configuration (including the camera [`Position`] it
/// advances), the tuning settings, and the host-built [`Convertor`]. Drive
/// it by calling gesture methods between frames and [`Navigation::update`]
/// once per frame; read the camera back out with
/// [`Navigation::position_to_camera`].
#[derive(Debug)]
pub struct Navigation<C: Convertor> {
    convertor: C,
    map: MapConfig,
    settings: NavigationSettings,
    /// Validated navigation SRS type; never cartesian.
    nav_kind: SrsType,
    /// Periodicity of the navigation SRS, for projected frames that wrap.
    periodicity: Option<Periodicity>,

    target_point: DVec3,
    change_rotation: DVec3,
    target_view_extent: f64,
    auto_rotation: f64,
    geo_mode: GeographicMode,
    nav_type: NavigationType,
    height_queue: VecDeque<HeightRequest>,
    last_height: Option<f64>,
    stats: NavigationStats,
}

impl<C: Convertor> Navigation<C> {
    /// Create the core for a loaded map configuration.
    ///
    /// `convertor` must have been built for the map's
    /// physical/navigation/public SRS triple. Fails with [`DomainError`]
    /// when the configuration violates the host contract; no partially
    /// working core is ever returned.
    pub fn new(
        map: MapConfig,
        settings: NavigationSettings,
        convertor: C,
    ) -> Result<Self, DomainError> {
        settings.validate()?;
        let srs = map.navigation_srs().ok_or_else(|| {
            DomainError::UnknownNavigationSrs(map.reference_frame.navigation_srs.clone())
        })?;
        if srs.kind == SrsType::Cartesian {
            return Err(DomainError::CartesianNavigationSrs);
        }
        let nav_kind = srs.kind;
        let periodicity = srs.periodicity;

        let geo_mode = resolve_configured_mode(settings.geographic_mode);
        let nav_type = settings.navigation_type;
        let mut nav = Self {
            target_point: map.position.point,
            change_rotation: DVec3::ZERO,
            target_view_extent: map.position.view_extent,
            auto_rotation: map.auto_rotate,
            geo_mode,
            nav_type,
            height_queue: VecDeque::with_capacity(HEIGHT_QUEUE_LEN),
            last_height: None,
            stats: NavigationStats::default(),
            convertor,
            map,
            settings,
            nav_kind,
            periodicity,
        };
        let orientation = nav.map.position.orientation;
        nav.map.position.orientation = DVec3::new(
            normalize_angle(orientation.x),
            normalize_angle(orientation.y),
            normalize_angle(orientation.z),
        );
        Ok(nav)
    }

    /// The persistent camera position.
    pub fn position(&self) -> &Position {
        &self.map.position
    }

    /// Where the position is converging to, in the navigation SRS.
    pub fn target_point(&self) -> DVec3 {
        self.target_point
    }

    /// Where the view extent is converging to.
    pub fn target_view_extent(&self) -> f64 {
        self.target_view_extent
    }

    /// The resolved geographic mode.
    pub fn geographic_mode(&self) -> GeographicMode {
        self.geo_mode
    }

    /// The motion profile the next ticks will use.
    pub fn navigation_type(&self) -> NavigationType {
        self.nav_type
    }

    /// Resolver diagnostics.
    pub fn stats(&self) -> &NavigationStats {
        &self.stats
    }

    /// The settings the core was built with.
    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    /// Advance the camera by one tick.
    ///
    /// Non-blocking: terrain tiles that have not loaded yet simply leave the
    /// target altitude where it was, to be corrected on a later tick.
    pub fn update<T: TileTree>(&mut self, tiles: &T, dt: Duration) {
        let timestep = dt.as_secs_f64();
        self.check_height_queue(tiles);

        // A floating altitude is relative to terrain; re-ground it once.
        if self.map.position.height_mode == HeightMode::Floating {
            self.map.position.height_mode = HeightMode::Fixed;
            let altitude = self.map.position.point.z;
            self.reset_position_altitude(altitude);
        }

        self.target_view_extent = self.target_view_extent.clamp(
            self.settings.view_extent_limits.min,
            self.settings.view_extent_limits.max,
        );

        if self.nav_kind == SrsType::Geographic {
            if self.settings.geographic_mode == GeographicNavMode::Dynamic {
                // Too close to a pole for azimuthal motion.
                if self.target_point.y.abs()
                    > self.settings.latitude_threshold - LATITUDE_EPSILON
                {
                    self.geo_mode = GeographicMode::Free;
                }
            } else {
                self.geo_mode = resolve_configured_mode(self.settings.geographic_mode);
            }

            if self.geo_mode == GeographicMode::Azimuthal {
                self.target_point.y = self.target_point.y.clamp(
                    -self.settings.latitude_threshold,
                    self.settings.latitude_threshold,
                );
            }
        }

        self.change_rotation.x += self.auto_rotation;

        let mut p = self.map.position.point;
        let r = self.map.position.orientation;

        // Residuals the solver integrates toward zero.
        let (horizontal, azimuths) = match self.nav_kind {
            SrsType::Projected => (
                (self.target_point.truncate() - p.truncate()).length(),
                None,
            ),
            SrsType::Geographic => {
                let geo = self.convertor.geo_inverse(p, self.target_point);
                (geo.distance, Some((geo.azi1, geo.azi2)))
            }
            SrsType::Cartesian => unreachable!("rejected at construction"),
        };
        let vertical = self.target_point.z - p.z;

        let step = solver::solve(
            &self.settings,
            self.nav_type,
            timestep,
            self.map.position.fov,
            horizontal,
            vertical,
            self.map.position.view_extent,
            self.target_view_extent - self.map.position.view_extent,
            r,
            self.change_rotation,
        );

        self.map.position.view_extent = step.view_extent;
        p.z += step.vertical;
        self.change_rotation -= step.orientation - r;
        let mut r = step.orientation;

        if horizontal > 0.0 {
            match self.nav_kind {
                SrsType::Projected => {
                    p += (self.target_point - p) * (step.horizontal / horizontal);
                }
                SrsType::Geographic => match self.geo_mode {
                    GeographicMode::Free => {
                        let (azi1, _) = azimuths.unwrap_or((0.0, 0.0));
                        let (moved, azi_out) =
                            self.convertor.geo_direct(p, step.horizontal, azi1);
                        p = moved;
                        // Heading drifts as the geodesic crosses meridians.
                        r.x += azi_out - azi1;
                    }
                    GeographicMode::Azimuthal => {
                        p.x += angular_diff(p.x, self.target_point.x)
                            * (step.horizontal / horizontal);
                        p.y += angular_diff(p.y, self.target_point.y)
                            * (step.horizontal / horizontal);
                    }
                },
                SrsType::Cartesian => unreachable!("rejected at construction"),
            }
        }

        // Wrap periodic axes, dragging the target along so the remaining
        // motion is unaffected.
        {
            let pre_wrap = p;
            match self.nav_kind {
                SrsType::Projected => {
                    if let Some(per) = self.periodicity {
                        let half = per.period * 0.5;
                        match per.axis {
                            PeriodicAxis::X => p.x = modulo(p.x + half, per.period) - half,
                            PeriodicAxis::Y => p.y = modulo(p.y + half, per.period) - half,
                        }
                    }
                }
                SrsType::Geographic => {
                    p.x = modulo(p.x + 180.0, 360.0) - 180.0;
                }
                SrsType::Cartesian => unreachable!("rejected at construction"),
            }
            self.target_point += p - pre_wrap;
        }

        r.x = normalize_angle(r.x);
        r.y = normalize_angle(r.y).clamp(PITCH_LIMITS.0, PITCH_LIMITS.1);
        r.z = normalize_angle(r.z);

        if self.nav_kind == SrsType::Geographic {
            debug_assert!((-180.0..=180.0).contains(&p.x));
            debug_assert!((-90.0..=90.0).contains(&p.y));
        }

        // Keep the altitude following the terrain under the new position.
        self.enqueue_height_request(HeightRequest::new(p.truncate()));

        self.map.position.point = p;
        self.map.position.orientation = r;
    }

    /// Pan gesture: move the target ground point in view-aligned screen
    /// axes. `delta.z` pans altitude directly.
    pub fn pan(&mut self, delta: DVec3) {
        let pos = &self.map.position;

        let lat_scale = if self.nav_kind == SrsType::Geographic
            && self.geo_mode == GeographicMode::Azimuthal
        {
            // Slower pan near poles, where a degree of longitude shrinks.
            pos.point.y.to_radians().cos()
        } else {
            1.0
        };

        // Pan speed tracks the zoom so a gesture covers a constant fraction
        // of the screen at any altitude.
        let v = pos.view_extent / 800.0;
        let mut mov = delta
            * DVec3::new(-2.0 * v * lat_scale, 2.0 * v, 2.0)
            * self.settings.sensitivity.pan;

        let mut azimuth = pos.orientation.x;
        if self.nav_kind == SrsType::Geographic && self.geo_mode == GeographicMode::Free {
            // Take the camera heading from the previous target position;
            // using the current one turns strangely near the poles.
            let geo = self.convertor.geo_inverse(pos.point, self.target_point);
            azimuth += geo.azi2 - geo.azi1;
        }
        mov = rotation_z(-azimuth) * mov;

        match self.nav_kind {
            SrsType::Projected => self.target_point += mov,
            SrsType::Geographic => {
                let bearing = mov.x.atan2(mov.y).to_degrees();
                let distance = mov.truncate().length();
                let (mut moved, _) =
                    self.convertor.geo_direct(self.target_point, distance, bearing);
                moved.z += mov.z;
                let accepted = match self.geo_mode {
                    GeographicMode::Azimuthal => {
                        angular_diff(pos.point.x, moved.x).abs() < PAN_REJECT_THRESHOLD
                    }
                    GeographicMode::Free => {
                        self.convertor.geo_arc_dist(pos.point, moved) < PAN_REJECT_THRESHOLD
                    }
                };
                if accepted {
                    self.target_point = moved;
                } else {
                    debug!("pan rejected: target would jump across a pole");
                }
            }
            SrsType::Cartesian => unreachable!("rejected at construction"),
        }

        self.auto_rotation = 0.0;
        self.nav_type = self.settings.navigation_type;
    }

    /// Rotate gesture: accumulate a view-rotation residual.
    pub fn rotate(&mut self, delta: DVec3) {
        self.change_rotation +=
            delta * DVec3::new(0.2, -0.1, 0.2) * self.settings.sensitivity.rotate;
        if self.settings.geographic_mode == GeographicNavMode::Dynamic {
            // Rotating only makes sense untethered from north.
            self.geo_mode = GeographicMode::Free;
        }
        self.auto_rotation = 0.0;
        self.nav_type = self.settings.navigation_type;
    }

    /// Zoom gesture: scale the target view extent.
    pub fn zoom(&mut self, amount: f64) {
        self.target_view_extent *=
            1.001_f64.powf(-(amount * self.settings.sensitivity.zoom));
        self.auto_rotation = 0.0;
        self.nav_type = self.settings.navigation_type;
    }

    /// Send the camera toward `point` under the given motion profile.
    ///
    /// An [`Instant`](NavigationType::Instant) jump also forgets all pending
    /// and past terrain samples; they belong to the place being left.
    pub fn set_point(&mut self, point: DVec3, nav_type: NavigationType) {
        self.target_point = point;
        self.auto_rotation = 0.0;
        self.nav_type = nav_type;
        if nav_type == NavigationType::Instant {
            self.last_height = None;
            self.height_queue.clear();
        }
    }

    /// Turn the camera toward the given Euler orientation.
    pub fn set_rotation(&mut self, euler: DVec3, nav_type: NavigationType) {
        self.change_rotation = angular_diff_vec(self.map.position.orientation, euler);
        self.auto_rotation = 0.0;
        self.nav_type = nav_type;
    }

    /// Zoom the camera toward the given view extent.
    pub fn set_view_extent(&mut self, extent: f64, nav_type: NavigationType) {
        self.target_view_extent = extent;
        self.auto_rotation = 0.0;
        self.nav_type = nav_type;
    }

    /// Re-ground the target altitude: once the terrain under the current
    /// position resolves, the target altitude becomes terrain height plus
    /// `offset`. Pending requests are discarded.
    pub fn reset_position_altitude(&mut self, offset: f64) {
        self.target_point.z = 0.0;
        self.last_height = None;
        self.height_queue.clear();
        self.height_queue.push_back(HeightRequest::absolute(
            self.map.position.point.truncate(),
            offset,
        ));
    }

    /// Re-resolve the geographic mode from the configured intent, undoing
    /// any dynamic promotion to free mode.
    pub fn reset_geographic_mode(&mut self) {
        self.geo_mode = resolve_configured_mode(self.settings.geographic_mode);
    }

    /// Switch the position between the objective and subjective conventions.
    pub fn convert_position_subj_obj(&mut self) {
        camera::convert_position_subj_obj(&mut self.map, &self.convertor, self.nav_kind);
    }

    /// The physical-SRS camera pose for the current position.
    pub fn position_to_camera(&self) -> CameraPose {
        camera::position_to_camera(&self.map, &self.convertor, self.nav_kind)
    }

    /// Distance between the camera eye and the orbit center.
    pub fn objective_distance(&self) -> f64 {
        camera::objective_distance(&self.map)
    }

    /// Advance the height queue by one non-blocking step.
    fn check_height_queue<T: TileTree>(&mut self, tiles: &T) {
        let Some(head) = self.height_queue.front_mut() else {
            return;
        };
        let resolution = head.process(
            &self.map,
            &self.settings,
            &self.convertor,
            tiles,
            &mut self.stats,
        );
        let reset_offset = head.reset_offset();
        match resolution {
            Resolution::Pending => {}
            Resolution::Failed => {
                self.stats.height_requests_failed += 1;
                self.height_queue.pop_front();
            }
            Resolution::Done(height) => {
                if let Some(offset) = reset_offset {
                    self.target_point.z = height + offset;
                } else if let Some(last) = self.last_height {
                    self.target_point.z += height - last;
                }
                self.last_height = Some(height);
                self.stats.height_requests_resolved += 1;
                self.height_queue.pop_front();
            }
        }
    }

    /// Queue a request, replacing the stale tail when the queue is full.
    fn enqueue_height_request(&mut self, request: HeightRequest) {
        if self.height_queue.len() < HEIGHT_QUEUE_LEN {
            self.height_queue.push_back(request);
        } else if let Some(tail) = self.height_queue.back_mut() {
            *tail = request;
        }
    }

    /// Number of queued terrain-height requests; never more than two.
    pub fn pending_height_requests(&self) -> usize {
        self.height_queue.len()
    }

    /// The terrain height reported by the most recently satisfied request.
    pub fn last_height_sample(&self) -> Option<f64> {
        self.last_height
    }
}

/// Map the configured mode onto a resolved one; the dynamic intent starts
/// azimuthal and is promoted per tick.
fn resolve_configured_mode(configured: GeographicNavMode) -> GeographicMode {
    match configured {
        GeographicNavMode::Azimuthal | GeographicNavMode::Dynamic => GeographicMode::Azimuthal,
        GeographicNavMode::Free => GeographicMode::Free,
    }
}
