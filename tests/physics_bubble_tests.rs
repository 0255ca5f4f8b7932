use orrery::bubble::Part;
use orrery::geometry::{StateVector, Vec3};
use orrery::*;

const EARTH_MU: f64 = 3.986_004_418e14;

fn low_orbit() -> StateVector {
    StateVector::new(Vec3::new(7.0e6, 0.0, 0.0), Vec3::new(0.0, 7_546.0, 0.0))
}

fn plugin_with_vessel() -> Plugin {
    let mut plugin = Plugin::new(0.0, 0.0).unwrap();
    plugin.insert_sun(0, EARTH_MU).unwrap();
    plugin.end_initialization().unwrap();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", low_orbit()).unwrap();
    plugin
}

fn two_parts() -> Vec<Part> {
    vec![
        Part::new(Vec3::new(0.0, 0.0, 0.0), Vec3::zeros(), 1.0),
        Part::new(Vec3::new(2.0, 0.0, 0.0), Vec3::zeros(), 3.0),
    ]
}

#[test]
fn test_bubble_starts_empty() {
    let plugin = plugin_with_vessel();
    assert!(plugin.physics_bubble_is_empty());
    assert_eq!(plugin.bubble_displacement_correction(&Vec3::zeros()), Err(PluginError::BubbleEmpty));
    assert_eq!(plugin.bubble_velocity_correction(0), Err(PluginError::BubbleEmpty));
}

#[test]
fn test_staging_validates_parts() {
    let mut plugin = plugin_with_vessel();

    let error = plugin.add_vessel_to_next_physics_bubble("V1", Vec::new()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedInput);

    let weightless = vec![Part::new(Vec3::zeros(), Vec3::zeros(), 0.0)];
    assert!(matches!(
        plugin.add_vessel_to_next_physics_bubble("V1", weightless),
        Err(PluginError::InvalidParameter { .. })
    ));

    let lost = vec![Part::new(Vec3::new(f64::NAN, 0.0, 0.0), Vec3::zeros(), 1.0)];
    assert!(plugin.add_vessel_to_next_physics_bubble("V1", lost).is_err());

    assert_eq!(
        plugin.add_vessel_to_next_physics_bubble("V9", two_parts()),
        Err(PluginError::UnknownVessel("V9".to_string()))
    );
}

#[test]
fn test_bubble_forms_at_next_advance() {
    let mut plugin = plugin_with_vessel();
    plugin.add_vessel_to_next_physics_bubble("V1", two_parts()).unwrap();
    // Staged parts only form the bubble once time advances
    assert!(plugin.physics_bubble_is_empty());

    plugin.advance_time(1.0, 0.0).unwrap();
    assert!(!plugin.physics_bubble_is_empty());

    let parts = plugin.physics_bubble_parts("V1").unwrap();
    assert_eq!(parts.len(), 2);
    for part in parts {
        // Gravity pulls back toward the central body
        assert!(part.gravitational_acceleration.x < 0.0);
        assert!((part.gravitational_acceleration.norm() - EARTH_MU / 7.0e6_f64.powi(2)).abs() < 0.01);
    }
}

#[test]
fn test_corrections_bring_parts_onto_the_integrated_centre() {
    let mut plugin = plugin_with_vessel();
    plugin.add_vessel_to_next_physics_bubble("V1", two_parts()).unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();

    // Parts' centre of mass is at (1.5, 0, 0) world, at rest
    let displacement = plugin.bubble_displacement_correction(&Vec3::zeros()).unwrap();
    let centre = plugin.vessel_from_parent("V1").unwrap();
    assert!((displacement - (centre.q - Vec3::new(1.5, 0.0, 0.0))).norm() < 1e-6);
    assert!((displacement.y - 7_546.0).abs() < 10.0);

    let velocity = plugin.bubble_velocity_correction(0).unwrap();
    assert!((velocity - centre.p).norm() < 1e-9);

    assert_eq!(plugin.bubble_velocity_correction(5), Err(PluginError::UnknownBody(5)));
}

#[test]
fn test_staging_keeps_the_vessel() {
    let mut plugin = plugin_with_vessel();
    plugin.advance_time(1.0, 0.0).unwrap();

    // No insert_or_keep this frame: staging alone keeps the vessel alive
    plugin.add_vessel_to_next_physics_bubble("V1", two_parts()).unwrap();
    plugin.advance_time(2.0, 0.0).unwrap();
    assert!(plugin.has_vessel("V1"));
    assert!(!plugin.physics_bubble_is_empty());
}

#[test]
fn test_restaging_replaces_parts() {
    let mut plugin = plugin_with_vessel();
    plugin.add_vessel_to_next_physics_bubble("V1", two_parts()).unwrap();
    plugin
        .add_vessel_to_next_physics_bubble("V1", vec![Part::new(Vec3::zeros(), Vec3::zeros(), 5.0)])
        .unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();
    assert_eq!(plugin.physics_bubble_parts("V1").unwrap().len(), 1);
}

#[test]
fn test_bubble_empties_when_nothing_is_staged() {
    let mut plugin = plugin_with_vessel();
    plugin.add_vessel_to_next_physics_bubble("V1", two_parts()).unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();
    assert!(!plugin.physics_bubble_is_empty());

    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.advance_time(2.0, 0.0).unwrap();
    assert!(plugin.physics_bubble_is_empty());

    // Free flight resumes from where the bubble left the vessel
    let state = plugin.vessel_from_parent("V1").unwrap();
    assert!((state.q.norm() - 7.0e6).abs() < 1.0e3);
}
