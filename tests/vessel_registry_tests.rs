use orrery::geometry::{StateVector, Vec3};
use orrery::vessel::MAX_GUID_LENGTH;
use orrery::*;

fn running_plugin() -> Plugin {
    let mut plugin = Plugin::new(0.0, 0.0).unwrap();
    plugin.insert_sun(0, 1.0).unwrap();
    plugin.end_initialization().unwrap();
    plugin
}

fn offset(x: f64) -> StateVector {
    StateVector::new(Vec3::new(x, 0.0, 0.0), Vec3::new(0.0, 1.0 / x.sqrt(), 0.0))
}

#[test]
fn test_insert_or_keep_is_idempotent() {
    let mut plugin = running_plugin();
    assert!(plugin.insert_or_keep_vessel("V1", 0).unwrap());
    assert!(!plugin.insert_or_keep_vessel("V1", 0).unwrap());
    assert!(!plugin.insert_or_keep_vessel("V1", 0).unwrap());
    assert_eq!(plugin.vessels().len(), 1);
}

#[test]
fn test_vessel_validation() {
    let mut plugin = running_plugin();
    assert_eq!(plugin.insert_or_keep_vessel("V1", 3), Err(PluginError::UnknownBody(3)));
    assert!(!plugin.has_vessel("V1"));

    let error = plugin.insert_or_keep_vessel("", 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedInput);

    let long_guid = "x".repeat(MAX_GUID_LENGTH + 1);
    assert!(matches!(
        plugin.insert_or_keep_vessel(&long_guid, 0),
        Err(PluginError::MalformedInput { .. })
    ));
    let longest_guid = "x".repeat(MAX_GUID_LENGTH);
    assert!(plugin.insert_or_keep_vessel(&longest_guid, 0).unwrap());
}

#[test]
fn test_state_is_set_exactly_once() {
    let mut plugin = running_plugin();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    assert_eq!(
        plugin.vessel_from_parent("V1"),
        Err(PluginError::VesselStateUnset("V1".to_string()))
    );

    plugin.set_vessel_state_offset("V1", offset(2.0)).unwrap();
    assert_eq!(plugin.vessel_from_parent("V1").unwrap(), offset(2.0));

    let error = plugin.set_vessel_state_offset("V1", offset(3.0)).unwrap_err();
    assert_eq!(error, PluginError::VesselStateAlreadySet("V1".to_string()));
    assert_eq!(error.kind(), ErrorKind::Sequencing);
    assert_eq!(plugin.vessel_from_parent("V1").unwrap(), offset(2.0));

    assert_eq!(
        plugin.set_vessel_state_offset("V2", offset(3.0)),
        Err(PluginError::UnknownVessel("V2".to_string()))
    );
}

#[test]
fn test_non_finite_vessel_state_rejected() {
    let mut plugin = running_plugin();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();

    let nan_offset = StateVector::new(Vec3::new(f64::NAN, 0.0, 0.0), Vec3::zeros());
    let error = plugin.set_vessel_state_offset("V1", nan_offset).unwrap_err();
    assert!(matches!(error, PluginError::InvalidParameter { field: "from_parent", .. }));
    assert_eq!(error.kind(), ErrorKind::MalformedInput);

    let infinite_offset = StateVector::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(f64::NEG_INFINITY, 0.0, 0.0));
    assert!(plugin.set_vessel_state_offset("V1", infinite_offset).is_err());

    // Nothing was recorded, so a valid state is still accepted
    assert!(matches!(plugin.vessel_from_parent("V1"), Err(PluginError::VesselStateUnset(_))));
    plugin.set_vessel_state_offset("V1", offset(2.0)).unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();
    assert!(plugin.vessel_from_parent("V1").unwrap().q.x.is_finite());
}

#[test]
fn test_unkept_vessels_are_pruned_at_the_next_advance() {
    let mut plugin = running_plugin();
    for (guid, x) in [("V1", 1.0), ("V2", 2.0), ("V3", 3.0)] {
        plugin.insert_or_keep_vessel(guid, 0).unwrap();
        plugin.set_vessel_state_offset(guid, offset(x)).unwrap();
    }
    plugin.advance_time(1.0, 0.0).unwrap();
    assert_eq!(plugin.vessels().len(), 3);

    // Next frame the host only reports V1 and V3
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.insert_or_keep_vessel("V3", 0).unwrap();
    let kept: Vec<bool> = plugin.vessels().iter().map(|(_, vessel)| vessel.is_kept()).collect();
    assert_eq!(kept, vec![true, false, true]);
    plugin.advance_time(2.0, 0.0).unwrap();
    assert!(plugin.vessels().iter().all(|(_, vessel)| !vessel.is_kept()));

    assert!(plugin.has_vessel("V1"));
    assert!(!plugin.has_vessel("V2"));
    assert!(plugin.has_vessel("V3"));

    // An empty frame empties the registry
    plugin.advance_time(3.0, 0.0).unwrap();
    assert!(plugin.vessels().is_empty());
}

#[test]
fn test_pruned_vessel_comes_back_fresh() {
    let mut plugin = running_plugin();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", offset(1.0)).unwrap();
    plugin.advance_time(1.0, 0.0).unwrap();
    plugin.advance_time(2.0, 0.0).unwrap();
    assert!(!plugin.has_vessel("V1"));

    assert!(plugin.insert_or_keep_vessel("V1", 0).unwrap());
    assert!(matches!(plugin.vessel_from_parent("V1"), Err(PluginError::VesselStateUnset(_))));
}

#[test]
fn test_vessel_histories_follow_the_grid() {
    let mut plugin = running_plugin();
    plugin.insert_or_keep_vessel("V1", 0).unwrap();
    plugin.set_vessel_state_offset("V1", offset(1.0)).unwrap();

    // Same end time reached through different frame cadences
    let mut other = running_plugin();
    other.insert_or_keep_vessel("V1", 0).unwrap();
    other.set_vessel_state_offset("V1", offset(1.0)).unwrap();

    plugin.advance_time(25.0, 0.0).unwrap();
    for t in [3.0, 7.5, 12.0, 19.0, 25.0] {
        other.insert_or_keep_vessel("V1", 0).unwrap();
        other.advance_time(t, 0.0).unwrap();
    }

    let times = |plugin: &Plugin| -> Vec<f64> {
        let (_, vessel) = plugin.vessels().iter().next().unwrap();
        vessel.history().iter().map(|(t, _)| t.seconds()).collect()
    };
    assert_eq!(times(&plugin), [0.0, 10.0, 20.0]);
    assert_eq!(times(&other), [0.0, 10.0, 20.0]);

    let a = plugin.vessel_from_parent("V1").unwrap();
    let b = other.vessel_from_parent("V1").unwrap();
    assert!((a.q - b.q).norm() < 1e-9);
    assert!((a.p - b.p).norm() < 1e-9);
}
