use lfp_bms::clock::ManualClock;
use lfp_bms::config::SohConfig;
use lfp_bms::persistence::{MemoryStore, SohRecord};
use lfp_bms::soh::{CycleDirection, SohEstimator};
use std::sync::Arc;

fn estimator(store: &MemoryStore) -> (SohEstimator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let mut soh = SohEstimator::new(
        6.0,
        SohConfig::default(),
        Box::new(store.clone()),
        clock.clone(),
    );
    soh.begin();
    (soh, clock)
}

/// Full swing 0 -> 100 -> 0 in 5 % steps
fn full_swing(soh: &mut SohEstimator) {
    soh.update(0.0, 25.0);
    for i in 1..=20 {
        soh.update(f64::from(i) * 5.0, 25.0);
    }
    for i in (0..20).rev() {
        soh.update(f64::from(i) * 5.0, 25.0);
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn fresh_pack_defaults() {
    let store = MemoryStore::new();
    let (soh, _clock) = estimator(&store);
    assert_eq!(soh.soh(), 100.0);
    assert_eq!(soh.total_cycles(), 0.0);
    assert_eq!(soh.current_capacity_ah(), 6.0);
    assert_eq!(soh.remaining_cycles(), 2000.0);
    assert!(!soh.end_of_life());
    assert_eq!(soh.direction(), CycleDirection::Unknown);
}

#[test]
fn two_hundred_points_of_movement_is_two_cycles() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    full_swing(&mut soh);

    assert!(approx(soh.total_cycles(), 2.0));
    assert!(approx(soh.equivalent_full_cycles(), 2.0));
    assert!(approx(soh.soh(), 99.98));
    assert!(approx(soh.current_capacity_ah(), 6.0 * 0.9998));
    assert_eq!(soh.direction(), CycleDirection::Discharging);
    assert_eq!(soh.cycle_depth(), 0.0);
}

#[test]
fn first_update_only_seeds() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    soh.update(70.0, 25.0);
    assert_eq!(soh.cycle_depth(), 0.0);
    soh.update(60.0, 25.0);
    assert!(approx(soh.cycle_depth(), 10.0));
}

#[test]
fn counters_survive_restart() {
    let store = MemoryStore::new();
    {
        let (mut soh, clock) = estimator(&store);
        full_swing(&mut soh);
        assert!(store.record().is_none());

        clock.advance(5 * 60 * 1000);
        soh.update(0.0, 25.0);
        assert!(store.record().is_some());
    }

    let (soh, _clock) = estimator(&store);
    assert!(approx(soh.total_cycles(), 2.0));
    assert!(approx(soh.soh(), 99.98));
}

#[test]
fn reset_cycles_leaves_soh_until_next_update() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    full_swing(&mut soh);

    soh.reset_cycles();
    assert_eq!(soh.total_cycles(), 0.0);
    assert_eq!(soh.equivalent_full_cycles(), 0.0);
    assert!(approx(soh.soh(), 99.98));
    assert_eq!(store.record().and_then(|r| r.total_cycles), Some(0.0));

    soh.update(0.0, 25.0);
    assert_eq!(soh.soh(), 100.0);
}

#[test]
fn reset_soh_restores_new_pack() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    soh.calibrate_from_capacity(5.4).unwrap();
    soh.reset_soh();

    assert_eq!(soh.soh(), 100.0);
    assert_eq!(soh.total_cycles(), 0.0);
    assert_eq!(soh.current_capacity_ah(), 6.0);
    let saved = store.record().unwrap();
    assert_eq!(saved.soh, Some(100.0));
}

#[test]
fn capacity_calibration_sets_soh_and_cycles() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    soh.calibrate_from_capacity(5.4).unwrap();

    assert!((soh.soh() - 90.0).abs() < 1e-6);
    assert!((soh.current_capacity_ah() - 5.4).abs() < 1e-6);
    assert!((soh.total_cycles() - 1000.0).abs() < 1e-3);
    assert!((soh.remaining_cycles() - 1000.0).abs() < 1e-3);
    assert!(store.record().is_some());

    soh.calibrate_from_capacity(4.5).unwrap();
    assert!(soh.end_of_life());
    assert_eq!(soh.remaining_cycles(), 0.0);

    // Oversized measurement clamps at a new pack
    soh.calibrate_from_capacity(7.0).unwrap();
    assert_eq!(soh.soh(), 100.0);
    assert_eq!(soh.total_cycles(), 0.0);
}

#[test]
fn invalid_calibration_is_rejected() {
    let store = MemoryStore::new();
    let (mut soh, _clock) = estimator(&store);
    assert!(soh.calibrate_from_capacity(0.0).is_err());
    assert!(soh.calibrate_from_capacity(-1.0).is_err());
    assert!(soh.calibrate_from_capacity(f64::NAN).is_err());
    assert_eq!(soh.soh(), 100.0);
    assert!(store.record().is_none());
}

#[test]
fn partial_record_falls_back_per_key() {
    let store = MemoryStore::with_record(SohRecord {
        soh: Some(95.0),
        ..Default::default()
    });
    let (soh, _clock) = estimator(&store);
    assert_eq!(soh.soh(), 95.0);
    assert_eq!(soh.total_cycles(), 0.0);
    assert!((soh.current_capacity_ah() - 5.7).abs() < 1e-9);
}

#[test]
fn loaded_capacity_follows_soh() {
    let store = MemoryStore::with_record(SohRecord {
        soh: Some(90.0),
        total_cycles: Some(1000.0),
        equivalent_full_cycles: Some(1000.0),
        current_capacity: Some(6.0),
    });
    let (soh, _clock) = estimator(&store);
    assert_eq!(soh.soh(), 90.0);
    assert!((soh.current_capacity_ah() - 5.4).abs() < 1e-9);

    let store = MemoryStore::with_record(SohRecord {
        soh: Some(150.0),
        current_capacity: Some(9.0),
        ..Default::default()
    });
    let (soh, _clock) = estimator(&store);
    assert_eq!(soh.soh(), 100.0);
    assert_eq!(soh.current_capacity_ah(), 6.0);
}

#[test]
fn soh_floor_is_zero() {
    let store = MemoryStore::new();
    let (soh, _clock) = estimator(&store);
    assert_eq!(soh.soh_from_cycles(20_000.0), 0.0);
    assert_eq!(soh.soh_from_cycles(0.0), 100.0);
}
