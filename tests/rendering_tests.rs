use orrery::geometry::{StateVector, Vec3};
use orrery::rendering::{FrameKind, Line};
use orrery::*;

const SUN: FrameKind = FrameKind::BodyCentredNonRotating { reference: 0 };

fn unit_orbit() -> StateVector {
    StateVector::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
}

fn fine_config() -> PluginConfig {
    PluginConfig {
        ephemeris_step: 0.01,
        history_step: 0.1,
        vessel_step: 0.01,
        ..PluginConfig::default()
    }
}

/// Sun, one light planet on a circular orbit and one vessel, advanced to t = 1.
fn system() -> Plugin {
    let mut plugin = Plugin::with_config(0.0, 0.0, fine_config()).unwrap();
    plugin.insert_sun(0, 1.0).unwrap();
    plugin.insert_celestial(1, 0, 1.0e-6, None, unit_orbit()).unwrap();
    plugin.end_initialization().unwrap();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin
        .set_vessel_state_offset("V1", StateVector::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(-0.7, 0.0, 0.0)))
        .unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();
    plugin
}

fn segments(mut line: Line) -> Vec<(Vec3, Vec3)> {
    let mut out = Vec::new();
    while !line.at_end() {
        let segment = line.fetch_and_increment().unwrap();
        out.push((segment.begin, segment.end));
    }
    out
}

#[test]
fn test_rendering_is_deterministic() {
    let plugin = system();
    let sun_world = Vec3::new(10.0, -3.0, 2.0);
    let first = plugin.rendered_vessel_trajectory("V1", SUN, &sun_world).unwrap();
    let second = plugin.rendered_vessel_trajectory("V1", SUN, &sun_world).unwrap();
    assert_eq!(first, second);

    let rotating = FrameKind::BarycentricRotating { primary: 0, secondary: 1 };
    let first = plugin.rendered_vessel_trajectory("V1", rotating, &sun_world).unwrap();
    let second = plugin.rendered_vessel_trajectory("V1", rotating, &sun_world).unwrap();
    assert_eq!(segments(first), segments(second));
}

#[test]
fn test_segments_are_contiguous() {
    let plugin = system();
    let line = plugin.rendered_vessel_trajectory("V1", SUN, &Vec3::zeros()).unwrap();
    // History at 0.0 .. 0.9 every 0.1 and, depending on rounding, at 1.0
    assert!(line.number_of_segments() >= 9);
    let segments = segments(line);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
}

#[test]
fn test_body_centred_frame_is_anchored_at_sun_world() {
    let mut plugin = Plugin::new(0.0, 0.0).unwrap();
    plugin.insert_sun(0, 1.0).unwrap();
    plugin.end_initialization().unwrap();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", unit_orbit()).unwrap();
    plugin.advance_time(10.0, 0.0).unwrap();

    let sun_world = Vec3::new(100.0, 0.0, 0.0);
    let mut line = plugin.rendered_vessel_trajectory("V1", SUN, &sun_world).unwrap();
    let first = line.fetch_and_increment().unwrap();
    assert_eq!(first.begin, Vec3::new(101.0, 0.0, 0.0));
}

#[test]
fn test_planetarium_rotation_turns_world_output() {
    let mut plugin = Plugin::new(0.0, 0.0).unwrap();
    plugin.insert_sun(0, 1.0).unwrap();
    plugin.end_initialization().unwrap();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", unit_orbit()).unwrap();
    plugin.advance_time(10.0, 90.0).unwrap();

    let mut line = plugin.rendered_vessel_trajectory("V1", SUN, &Vec3::zeros()).unwrap();
    let first = line.fetch_and_increment().unwrap();
    assert!((first.begin - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
}

#[test]
fn test_secondary_is_fixed_in_barycentric_rotating_frame() {
    let plugin = system();
    let rotating = FrameKind::BarycentricRotating { primary: 0, secondary: 1 };
    let line = plugin.rendered_celestial_trajectory(1, rotating, &Vec3::zeros()).unwrap();
    assert!(line.number_of_segments() >= 99);

    // Every point of the secondary's past maps to where it is now
    let now = plugin.celestial_from_parent(1).unwrap().q;
    for (begin, end) in segments(line) {
        assert!((begin - now).norm() < 1e-3);
        assert!((end - now).norm() < 1e-3);
    }
}

#[test]
fn test_celestial_trajectory_in_its_own_frame_is_a_point() {
    let plugin = system();
    let frame = FrameKind::BodyCentredNonRotating { reference: 1 };
    let line = plugin.rendered_celestial_trajectory(1, frame, &Vec3::zeros()).unwrap();
    let now = plugin.celestial_from_parent(1).unwrap().q;
    for (begin, _) in segments(line) {
        assert!((begin - now).norm() < 1e-9);
    }
}

#[test]
fn test_frame_validation() {
    let plugin = system();
    assert!(matches!(
        plugin.validate_frame(FrameKind::BarycentricRotating { primary: 1, secondary: 1 }),
        Err(PluginError::InvalidParameter { field: "secondary", .. })
    ));
    assert_eq!(
        plugin.validate_frame(FrameKind::BodyCentredNonRotating { reference: 4 }),
        Err(PluginError::UnknownBody(4))
    );
    assert!(plugin.validate_frame(FrameKind::BarycentricRotating { primary: 0, secondary: 1 }).is_ok());

    let initializing = Plugin::new(0.0, 0.0).unwrap();
    assert!(matches!(initializing.validate_frame(SUN), Err(PluginError::WrongPhase { .. })));
}

#[test]
fn test_unknown_subjects() {
    let plugin = system();
    assert_eq!(
        plugin.rendered_vessel_trajectory("V2", SUN, &Vec3::zeros()).unwrap_err(),
        PluginError::UnknownVessel("V2".to_string())
    );
    assert_eq!(
        plugin.rendered_celestial_trajectory(8, SUN, &Vec3::zeros()).unwrap_err(),
        PluginError::UnknownBody(8)
    );
}

#[test]
fn test_exhausted_line() {
    let plugin = system();
    let mut line = plugin.rendered_vessel_trajectory("V1", SUN, &Vec3::zeros()).unwrap();
    for _ in 0..line.number_of_segments() {
        line.fetch_and_increment().unwrap();
    }
    assert!(line.at_end());
    let error = line.fetch_and_increment().unwrap_err();
    assert_eq!(error, PluginError::IteratorExhausted);
    assert_eq!(error.kind(), ErrorKind::ResourceLifetime);
}

#[test]
fn test_vessel_tangent_and_navball() {
    let mut plugin = Plugin::new(0.0, 0.0).unwrap();
    plugin.insert_sun(0, 1.0).unwrap();
    plugin.end_initialization().unwrap();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", unit_orbit()).unwrap();

    let tangent = plugin.vessel_tangent("V1", SUN).unwrap();
    assert!((tangent - Vec3::y()).norm() < 1e-12);

    let orientation = plugin.navball_orientation(SUN).unwrap();
    assert!(orientation.angle() < 1e-12);

    plugin.advance_time(1.0, 90.0).unwrap();
    let orientation = plugin.navball_orientation(SUN).unwrap();
    assert!((orientation.angle() - core::f64::consts::FRAC_PI_2).abs() < 1e-12);
}
