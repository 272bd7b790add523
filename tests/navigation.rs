//! Scenario tests driving the navigation core through its public API, with a
//! flat projected convertor and a spherical geographic one standing in for
//! the host's projection library.

use std::collections::HashMap;
use std::time::Duration;

use approx::assert_relative_eq;
use bevy_math::{DVec2, DVec3};
use terra_nav::prelude::*;

const TICK: Duration = Duration::from_nanos(16_666_667);
const EARTH_RADIUS: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// Fakes

/// Identity conversions for projected navigation; geodesic calls are out of
/// bounds in a projected frame.
struct FlatConvertor;

impl Convertor for FlatConvertor {
    fn phys_to_nav(&self, point: DVec3) -> DVec3 {
        point
    }
    fn nav_to_phys(&self, point: DVec3) -> DVec3 {
        point
    }
    fn convert(&self, point: DVec3, _: &str, _: &str) -> Result<DVec3, ProjectionError> {
        Ok(point)
    }
    fn geo_direct(&self, _: DVec3, _: f64, _: f64) -> (DVec3, f64) {
        unreachable!("projected navigation never travels geodesics")
    }
    fn geo_inverse(&self, _: DVec3, _: DVec3) -> Geodesic {
        unreachable!("projected navigation never travels geodesics")
    }
    fn geo_arc_dist(&self, _: DVec3, _: DVec3) -> f64 {
        unreachable!("projected navigation never travels geodesics")
    }
}

/// Great-circle math on a sphere; good enough to stand in for an ellipsoid
/// in tests. Points are (lon, lat, altitude) in degrees and meters.
struct SphereConvertor;

fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn wrap_azimuth(azimuth: f64) -> f64 {
    azimuth.rem_euclid(360.0)
}

/// Initial bearing from `a` toward `b`, degrees clockwise from north.
fn bearing(a: DVec3, b: DVec3) -> f64 {
    let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
    let dlon = (b.x - a.x).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    wrap_azimuth(y.atan2(x).to_degrees())
}

/// Forward bearing at `b` for the great circle from `a`, degrees clockwise
/// from north. Returns 0 for coincident points, matching [`bearing`].
fn final_bearing(a: DVec3, b: DVec3) -> f64 {
    let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
    let dlon = (b.x - a.x).to_radians();
    let y = dlon.sin() * lat1.cos();
    let x = lat2.sin() * lat1.cos() * dlon.cos() - lat2.cos() * lat1.sin();
    wrap_azimuth(y.atan2(x).to_degrees())
}

/// Central angle between `a` and `b`, radians.
fn central_angle(a: DVec3, b: DVec3) -> f64 {
    let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
    let dlon = (b.x - a.x).to_radians();
    let dot = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    dot.clamp(-1.0, 1.0).acos()
}

impl Convertor for SphereConvertor {
    fn phys_to_nav(&self, point: DVec3) -> DVec3 {
        point
    }
    fn nav_to_phys(&self, point: DVec3) -> DVec3 {
        point
    }
    fn convert(&self, point: DVec3, _: &str, _: &str) -> Result<DVec3, ProjectionError> {
        Ok(point)
    }

    fn geo_direct(&self, origin: DVec3, distance: f64, azimuth: f64) -> (DVec3, f64) {
        let lat1 = origin.y.to_radians();
        let lon1 = origin.x.to_radians();
        let delta = distance / EARTH_RADIUS;
        let theta = azimuth.to_radians();
        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
        let lon2 = lon1
            + (theta.sin() * delta.sin() * lat1.cos())
                .atan2(delta.cos() - lat1.sin() * lat2.sin());
        let destination = DVec3::new(wrap_lon(lon2.to_degrees()), lat2.to_degrees(), origin.z);
        (destination, final_bearing(origin, destination))
    }

    fn geo_inverse(&self, a: DVec3, b: DVec3) -> Geodesic {
        Geodesic {
            distance: central_angle(a, b) * EARTH_RADIUS,
            azi1: bearing(a, b),
            azi2: final_bearing(a, b),
        }
    }

    fn geo_arc_dist(&self, a: DVec3, b: DVec3) -> f64 {
        central_angle(a, b).to_degrees()
    }
}

struct FakeNode {
    id: TileId,
    validity: Validity,
    surrogate: Option<f64>,
    children: Vec<FakeNode>,
}

impl TraverseNode for FakeNode {
    fn validity(&self) -> Validity {
        self.validity
    }
    fn id(&self) -> TileId {
        self.id
    }
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
    fn find_child(&self, id: TileId) -> Option<&Self> {
        self.children.iter().find(|child| child.id == id)
    }
    fn surrogate(&self) -> Option<f64> {
        self.surrogate
    }
}

struct FakeTree {
    root: Option<FakeNode>,
}

impl FakeTree {
    fn unloaded() -> Self {
        Self { root: None }
    }

    fn flat(surrogate: f64) -> Self {
        Self {
            root: Some(FakeNode {
                id: TileId::new(0, 0, 0),
                validity: Validity::Valid,
                surrogate: Some(surrogate),
                children: vec![],
            }),
        }
    }
}

impl TileTree for FakeTree {
    type Node = FakeNode;
    fn root(&self) -> Option<&FakeNode> {
        self.root.as_ref()
    }
    fn request(&self, _: &FakeNode) {}
}

// ---------------------------------------------------------------------------
// Map configurations

fn srs_registry(kind: SrsType, periodicity: Option<Periodicity>) -> HashMap<String, Srs> {
    HashMap::from([
        ("nav".to_owned(), Srs { kind, periodicity }),
        (
            "sds".to_owned(),
            Srs {
                kind: SrsType::Projected,
                periodicity: None,
            },
        ),
        (
            "phys".to_owned(),
            Srs {
                kind: SrsType::Cartesian,
                periodicity: None,
            },
        ),
    ])
}

fn reference_frame(division: Vec<DivisionNode>) -> ReferenceFrame {
    ReferenceFrame {
        physical_srs: "phys".to_owned(),
        navigation_srs: "nav".to_owned(),
        public_srs: "pub".to_owned(),
        division,
    }
}

fn sampled_division() -> Vec<DivisionNode> {
    vec![DivisionNode {
        id: TileId::new(0, 0, 0),
        srs: "sds".to_owned(),
        extents: Extents2::new(DVec2::ZERO, DVec2::splat(1024.0)),
        partitioning: Partitioning::Bisection,
    }]
}

fn projected_map(periodicity: Option<Periodicity>, position: Position) -> MapConfig {
    MapConfig {
        reference_frame: reference_frame(sampled_division()),
        srs: srs_registry(SrsType::Projected, periodicity),
        position,
        auto_rotate: 0.0,
    }
}

fn geographic_map(position: Position) -> MapConfig {
    MapConfig {
        reference_frame: reference_frame(vec![]),
        srs: srs_registry(SrsType::Geographic, None),
        position,
        auto_rotate: 0.0,
    }
}

fn x_periodicity(period: f64) -> Option<Periodicity> {
    Some(Periodicity {
        axis: PeriodicAxis::X,
        period,
    })
}

fn quick_settings(pan_inertia: f64) -> NavigationSettings {
    NavigationSettings {
        inertia: Inertia {
            pan: pan_inertia,
            rotate: pan_inertia,
            zoom: pan_inertia,
        },
        ..NavigationSettings::default()
    }
}

fn assert_tick_invariants<C: Convertor>(nav: &Navigation<C>, geographic: bool) {
    let pos = nav.position();
    for angle in [pos.orientation.x, pos.orientation.y, pos.orientation.z] {
        assert!((0.0..360.0).contains(&angle), "orientation {angle} out of range");
    }
    assert!((270.0..=350.0).contains(&pos.orientation.y), "pitch out of range");
    let limits = &nav.settings().view_extent_limits;
    assert!(nav.target_view_extent() >= limits.min && nav.target_view_extent() <= limits.max);
    assert!(nav.pending_height_requests() <= 2);
    if geographic {
        assert!((-180.0..=180.0).contains(&pos.point.x));
        assert!((-90.0..=90.0).contains(&pos.point.y));
    }
}

// ---------------------------------------------------------------------------
// Scenarios

#[test]
fn s1_projected_convergence_is_monotonic() {
    let position = Position {
        point: DVec3::new(0.0, 0.0, 100.0),
        view_extent: 100.0,
        ..Position::default()
    };
    let map = projected_map(x_periodicity(1000.0), position);
    let mut nav = Navigation::new(map, quick_settings(0.1), FlatConvertor).unwrap();
    let tree = FakeTree::unloaded();

    let orientation = nav.position().orientation;
    nav.set_point(DVec3::new(300.0, 0.0, 100.0), NavigationType::Quick);

    let mut last_x = 0.0;
    for _ in 0..100 {
        nav.update(&tree, TICK);
        let x = nav.position().point.x;
        assert!(x >= last_x, "x went backwards: {x} < {last_x}");
        assert!(x <= 300.0 + 1e-9);
        last_x = x;
        assert_tick_invariants(&nav, false);
    }
    assert_relative_eq!(last_x, 300.0, epsilon = 1e-6);
    assert_eq!(nav.position().orientation, orientation);
}

#[test]
fn s2_periodic_wrap_shifts_target() {
    let position = Position {
        point: DVec3::new(0.0, 0.0, 100.0),
        view_extent: 100.0,
        ..Position::default()
    };
    let map = projected_map(x_periodicity(1000.0), position);
    let mut nav = Navigation::new(map, quick_settings(0.1), FlatConvertor).unwrap();
    let tree = FakeTree::unloaded();

    // Far enough past the -500 boundary that the first tick crosses it.
    nav.set_point(DVec3::new(-600.0, 0.0, 100.0), NavigationType::Quick);
    nav.update(&tree, TICK);

    // One tick closes ~90% of the 600-unit trip, landing near -540, which
    // wraps to +460; the target is dragged by the same +1000.
    let x = nav.position().point.x;
    assert!((-500.0..500.0).contains(&x));
    assert_relative_eq!(x, 460.0, epsilon = 1e-3);
    assert_relative_eq!(nav.target_point().x, 400.0, epsilon = 1e-3);

    // Relative direction survived the wrap: the motion keeps converging.
    for _ in 0..100 {
        nav.update(&tree, TICK);
        assert_tick_invariants(&nav, false);
    }
    assert_relative_eq!(nav.position().point.x, 400.0, epsilon = 1e-6);
}

#[test]
fn s3_azimuthal_latitude_clamp() {
    let mut settings = quick_settings(0.1);
    settings.geographic_mode = GeographicNavMode::Azimuthal;
    settings.latitude_threshold = 80.0;
    let mut nav =
        Navigation::new(geographic_map(Position::default()), settings, SphereConvertor).unwrap();
    let tree = FakeTree::unloaded();

    nav.set_point(DVec3::new(0.0, 95.0, 0.0), NavigationType::Instant);
    nav.update(&tree, TICK);

    assert_relative_eq!(nav.target_point().y, 80.0);
    assert_relative_eq!(nav.position().point.y, 80.0, epsilon = 1e-9);
    assert_tick_invariants(&nav, true);
}

#[test]
fn s4_dynamic_mode_promotes_to_free_near_pole() {
    let mut settings = quick_settings(0.1);
    settings.geographic_mode = GeographicNavMode::Dynamic;
    settings.latitude_threshold = 80.0;
    let mut nav =
        Navigation::new(geographic_map(Position::default()), settings, SphereConvertor).unwrap();
    let tree = FakeTree::unloaded();

    assert_eq!(nav.geographic_mode(), GeographicMode::Azimuthal);
    nav.set_point(DVec3::new(0.0, 80.0 - 1e-6, 0.0), NavigationType::Quick);
    nav.update(&tree, TICK);

    assert_eq!(nav.geographic_mode(), GeographicMode::Free);
    assert_tick_invariants(&nav, true);

    // The promotion is sticky until explicitly reset.
    nav.reset_geographic_mode();
    assert_eq!(nav.geographic_mode(), GeographicMode::Azimuthal);
}

#[test]
fn s5_height_regrounding_applies_terrain_plus_offset() {
    let position = Position {
        point: DVec3::new(600.0, 600.0, 100.0),
        view_extent: 64.0,
        ..Position::default()
    };
    let map = projected_map(None, position);
    let mut settings = quick_settings(0.9);
    // Keep the 64-unit view extent legal so the sampled lod stays put.
    settings.view_extent_limits.min = 10.0;
    let mut nav = Navigation::new(map, settings, FlatConvertor).unwrap();
    let tree = FakeTree::flat(42.0);

    nav.reset_position_altitude(5.0);
    assert_eq!(nav.pending_height_requests(), 1);

    nav.update(&tree, TICK);
    assert_relative_eq!(nav.target_point().z, 47.0);
    assert_eq!(nav.last_height_sample(), Some(42.0));

    // Follow-up relative samples see unchanged terrain and leave the target
    // alone while the camera descends toward it.
    for _ in 0..200 {
        nav.update(&tree, TICK);
        assert_tick_invariants(&nav, false);
    }
    assert_relative_eq!(nav.target_point().z, 47.0);
    assert_relative_eq!(nav.position().point.z, 47.0, epsilon = 1e-3);
    assert!(nav.stats().height_requests_resolved > 1);
    assert_eq!(nav.stats().last_height_request_lod, Some(5));
}

#[test]
fn s6_pole_flip_pan_is_rejected() {
    let mut settings = quick_settings(0.1);
    settings.geographic_mode = GeographicNavMode::Free;
    let position = Position {
        point: DVec3::new(179.0, 89.0, 0.0),
        view_extent: 1.0e6,
        ..Position::default()
    };
    let mut nav = Navigation::new(geographic_map(position), settings, SphereConvertor).unwrap();
    let tree = FakeTree::unloaded();

    // A pan spanning most of the sphere: ~2e7 m is ~180 arc-degrees.
    nav.pan(DVec3::new(0.0, 8000.0, 0.0));
    assert_eq!(nav.target_point(), DVec3::new(179.0, 89.0, 0.0));

    // The rejected gesture still leaves a healthy controller behind.
    nav.update(&tree, TICK);
    assert_tick_invariants(&nav, true);
}

// ---------------------------------------------------------------------------
// Invariants

#[test]
fn instant_tick_at_rest_changes_nothing() {
    let position = Position {
        point: DVec3::new(12.0, -7.0, 55.0),
        view_extent: 512.0,
        ..Position::default()
    };
    let map = projected_map(None, position.clone());
    let mut nav = Navigation::new(map, NavigationSettings::default(), FlatConvertor).unwrap();
    let tree = FakeTree::unloaded();

    nav.set_point(position.point, NavigationType::Instant);
    nav.update(&tree, TICK);

    assert_eq!(nav.position().point, position.point);
    assert_eq!(nav.position().orientation, position.orientation);
    assert_eq!(nav.position().view_extent, position.view_extent);
}

#[test]
fn pan_and_negated_pan_round_trip() {
    let position = Position {
        point: DVec3::new(100.0, 200.0, 50.0),
        view_extent: 800.0,
        ..Position::default()
    };
    let map = projected_map(None, position);
    let mut nav = Navigation::new(map, NavigationSettings::default(), FlatConvertor).unwrap();

    let before = nav.target_point();
    let delta = DVec3::new(1.5, -0.7, 0.3);
    nav.pan(delta);
    assert!(nav.target_point() != before);
    nav.pan(-delta);
    let after = nav.target_point();
    assert_relative_eq!(after.x, before.x, epsilon = 1e-9);
    assert_relative_eq!(after.y, before.y, epsilon = 1e-9);
    assert_relative_eq!(after.z, before.z, epsilon = 1e-9);
}

#[test]
fn instant_set_point_forgets_height_state() {
    let position = Position {
        point: DVec3::new(600.0, 600.0, 100.0),
        view_extent: 64.0,
        ..Position::default()
    };
    let map = projected_map(None, position);
    let mut nav = Navigation::new(map, NavigationSettings::default(), FlatConvertor).unwrap();
    let tree = FakeTree::flat(42.0);

    // Accumulate height state first.
    nav.update(&tree, TICK);
    nav.update(&tree, TICK);
    assert!(nav.last_height_sample().is_some());
    assert!(nav.pending_height_requests() > 0);

    nav.set_point(DVec3::new(10.0, 10.0, 0.0), NavigationType::Instant);
    assert_eq!(nav.last_height_sample(), None);
    assert_eq!(nav.pending_height_requests(), 0);
}

#[test]
fn subjective_objective_double_toggle_is_identity() {
    let position = Position {
        point: DVec3::new(250.0, -40.0, 1200.0),
        view_extent: 3000.0,
        ..Position::default()
    };
    let map = projected_map(None, position.clone());
    let mut nav = Navigation::new(map, NavigationSettings::default(), FlatConvertor).unwrap();

    assert_eq!(nav.position().kind, PositionKind::Objective);
    nav.convert_position_subj_obj();
    assert_eq!(nav.position().kind, PositionKind::Subjective);
    assert!(nav.position().point != position.point);

    nav.convert_position_subj_obj();
    assert_eq!(nav.position().kind, PositionKind::Objective);
    let point = nav.position().point;
    assert_relative_eq!(point.x, position.point.x, epsilon = 1e-9);
    assert_relative_eq!(point.y, position.point.y, epsilon = 1e-9);
    assert_relative_eq!(point.z, position.point.z, epsilon = 1e-9);
}

#[test]
fn view_extent_target_is_clamped_each_tick() {
    let map = projected_map(None, Position::default());
    let mut nav = Navigation::new(map, NavigationSettings::default(), FlatConvertor).unwrap();
    let tree = FakeTree::unloaded();

    // Zoom out absurdly far; the target must come back inside the limits.
    nav.zoom(-1.0e5);
    nav.update(&tree, TICK);
    assert_relative_eq!(nav.target_view_extent(), nav.settings().view_extent_limits.max);

    nav.zoom(1.0e6);
    nav.update(&tree, TICK);
    assert_relative_eq!(nav.target_view_extent(), nav.settings().view_extent_limits.min);
}

#[test]
fn free_mode_quick_motion_converges_on_the_sphere() {
    let mut settings = quick_settings(0.1);
    settings.geographic_mode = GeographicNavMode::Free;
    let position = Position {
        point: DVec3::new(14.0, 50.0, 0.0),
        view_extent: 1.0e5,
        ..Position::default()
    };
    let mut nav = Navigation::new(geographic_map(position), settings, SphereConvertor).unwrap();
    let tree = FakeTree::unloaded();

    let target = DVec3::new(21.0, 52.0, 0.0);
    nav.set_point(target, NavigationType::Quick);

    let convertor = SphereConvertor;
    let mut last_distance = f64::MAX;
    for _ in 0..200 {
        nav.update(&tree, TICK);
        let distance = convertor.geo_arc_dist(nav.position().point, nav.target_point());
        assert!(distance <= last_distance + 1e-9);
        last_distance = distance;
        assert_tick_invariants(&nav, true);
    }
    assert!(last_distance < 0.01, "still {last_distance} degrees away");
}

#[test]
fn rotate_under_dynamic_mode_unlocks_free_rotation() {
    let mut settings = NavigationSettings::default();
    settings.geographic_mode = GeographicNavMode::Dynamic;
    let mut nav =
        Navigation::new(geographic_map(Position::default()), settings, SphereConvertor).unwrap();

    assert_eq!(nav.geographic_mode(), GeographicMode::Azimuthal);
    nav.rotate(DVec3::new(5.0, 0.0, 0.0));
    assert_eq!(nav.geographic_mode(), GeographicMode::Free);
}

#[test]
fn cartesian_navigation_srs_is_rejected() {
    let mut map = projected_map(None, Position::default());
    map.reference_frame.navigation_srs = "phys".to_owned();
    let result = Navigation::new(map, NavigationSettings::default(), FlatConvertor);
    assert!(matches!(result, Err(DomainError::CartesianNavigationSrs)));

    let map = projected_map(None, Position::default());
    let mut settings = NavigationSettings::default();
    settings.inertia.pan = -0.1;
    let result = Navigation::new(map, settings, FlatConvertor);
    assert!(matches!(result, Err(DomainError::InertiaOutOfRange { .. })));
}
