use lfp_bms::clock::ManualClock;
use lfp_bms::config::SocConfig;
use lfp_bms::soc::SocEstimator;
use std::sync::Arc;

fn estimator() -> (SocEstimator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let soc = SocEstimator::new(6.0, SocConfig::default(), clock.clone());
    (soc, clock)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn ocv_curve_is_monotonic_and_saturates() {
    let (soc, _clock) = estimator();
    let mut prev = -1.0;
    let mut v = 8.5;
    while v <= 15.0 {
        let s = soc.ocv_to_soc(v);
        assert!(s >= prev, "OCV SOC decreased at {:.2} V", v);
        assert!((0.0..=100.0).contains(&s));
        prev = s;
        v += 0.01;
    }
    assert_eq!(soc.ocv_to_soc(8.0), 0.0);
    assert_eq!(soc.ocv_to_soc(9.0), 0.0);
    assert_eq!(soc.ocv_to_soc(14.5), 100.0);
    assert_eq!(soc.ocv_to_soc(16.0), 100.0);
}

#[test]
fn zero_current_does_not_drift_at_room_temperature() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);
    let start = soc.soc();
    for _ in 0..100 {
        clock.advance(1000);
        soc.update(0.0, 25.0);
    }
    assert!(approx(soc.soc(), start));
    assert!(approx(soc.coulomb_counter_mah(), 3000.0));
}

#[test]
fn one_amp_for_an_hour_adds_one_sixth() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);
    for _ in 0..3600 {
        clock.advance(1000);
        soc.update(1.0, 25.0);
    }
    assert!((soc.coulomb_counter_mah() - 4000.0).abs() < 1e-3);
    assert!((soc.soc() - 4000.0 / 6000.0 * 100.0).abs() < 1e-3);
}

#[test]
fn reset_clamps_and_rederives_counter() {
    let (mut soc, _clock) = estimator();
    soc.initialize_from_voltage(13.20);

    soc.reset(42.5);
    assert!(approx(soc.soc(), 42.5));
    assert!(approx(soc.coulomb_counter_mah(), 2550.0));

    soc.reset(120.0);
    assert_eq!(soc.soc(), 100.0);
    assert!(approx(soc.coulomb_counter_mah(), 6000.0));

    soc.reset(-5.0);
    assert_eq!(soc.soc(), 0.0);
    assert_eq!(soc.coulomb_counter_mah(), 0.0);

    soc.reset(f64::NAN);
    assert_eq!(soc.soc(), 0.0);
}

#[test]
fn initialization_happens_once() {
    let (mut soc, _clock) = estimator();
    assert!(!soc.is_initialized());
    soc.initialize_from_voltage(13.20);
    assert!(soc.is_initialized());
    assert!(approx(soc.soc(), 50.0));

    soc.initialize_from_voltage(14.50);
    assert!(approx(soc.soc(), 50.0));
}

#[test]
fn full_charge_snap_after_rest() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);

    // Top-off at the charger's absorption voltage
    soc.recalibrate(14.55, 0.5);
    assert!(soc.charged_full_this_cycle());

    clock.advance(1000);
    soc.recalibrate(14.45, 0.0);
    assert!(soc.is_idle());
    assert!(approx(soc.soc(), 50.0));

    clock.advance(29 * 60 * 1000);
    soc.recalibrate(14.45, 0.0);
    assert!(approx(soc.soc(), 50.0));

    clock.advance(60 * 1000);
    soc.recalibrate(14.45, 0.0);
    assert_eq!(soc.soc(), 100.0);
    assert_eq!(soc.coulomb_counter_mah(), 6000.0);
}

#[test]
fn sagging_below_disarm_prevents_snap() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);

    soc.recalibrate(14.55, 0.5);
    assert!(soc.charged_full_this_cycle());

    clock.advance(1000);
    soc.recalibrate(13.10, 0.0);
    assert!(!soc.charged_full_this_cycle());

    clock.advance(1000);
    soc.recalibrate(14.45, 0.0);
    clock.advance(31 * 60 * 1000);
    soc.recalibrate(14.45, 0.0);
    assert!(approx(soc.soc(), 50.0));
}

#[test]
fn long_rest_blends_towards_ocv() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);
    soc.reset(80.0);

    soc.recalibrate(13.20, 0.0);
    clock.advance(2 * 60 * 60 * 1000);
    soc.recalibrate(13.20, 0.0);
    // Strictly more than two hours of rest is required
    assert!(approx(soc.soc(), 80.0));

    clock.advance(1000);
    soc.recalibrate(13.20, 0.0);
    // 80 * 0.85 + 50 * 0.15
    assert!(approx(soc.soc(), 75.5));
    assert!(approx(soc.coulomb_counter_mah(), 4530.0));

    // The idle timer restarted, so no second blend right away
    clock.advance(1000);
    soc.recalibrate(13.20, 0.0);
    assert!(approx(soc.soc(), 75.5));
}

#[test]
fn small_ocv_disagreement_is_left_alone() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);
    soc.reset(54.0);

    soc.recalibrate(13.20, 0.0);
    clock.advance(3 * 60 * 60 * 1000);
    soc.recalibrate(13.20, 0.0);
    assert!(approx(soc.soc(), 54.0));
}

#[test]
fn current_breaks_idle() {
    let (mut soc, clock) = estimator();
    soc.initialize_from_voltage(13.20);
    soc.reset(80.0);

    soc.recalibrate(13.20, 0.0);
    clock.advance(60 * 60 * 1000);
    soc.recalibrate(13.20, -0.5);
    assert!(!soc.is_idle());
    soc.recalibrate(13.20, 0.0);
    clock.advance(90 * 60 * 1000);
    soc.recalibrate(13.20, 0.0);
    assert!(approx(soc.soc(), 80.0));
}
