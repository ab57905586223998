use lfp_bms::clock::ManualClock;
use lfp_bms::config::ProtectionConfig;
use lfp_bms::protection::{FaultChannel, ProtectionEngine, ProtectionEvent, Transition};
use std::sync::Arc;

const NOMINAL: [f64; 4] = [3.30; 4];

fn engine() -> (ProtectionEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    (
        ProtectionEngine::new(ProtectionConfig::default(), clock.clone()),
        clock,
    )
}

#[test]
fn nominal_pack_has_no_faults() {
    let (mut p, _clock) = engine();
    let events = p.update(&NOMINAL, 0.0, 25.0);
    assert!(events.is_empty());
    assert!(p.active_faults().is_empty());
    assert!(p.charge_enabled());
    assert!(p.discharge_enabled());
}

#[test]
fn overvoltage_while_charging_cuts_charge_only() {
    let (mut p, clock) = engine();
    let events = p.update(&[3.70, 3.30, 3.30, 3.30], 1.5, 25.0);

    assert!(events.contains(&ProtectionEvent {
        channel: FaultChannel::ChargeOvervoltage,
        transition: Transition::Tripped,
    }));
    // 1.5 A is also above the charge current trip
    assert!(p.is_fault(FaultChannel::ChargeOvercurrent));
    assert!(!p.charge_enabled());
    assert!(p.discharge_enabled());

    // Back inside both release thresholds: held for the full debounce
    p.update(&NOMINAL, 0.5, 25.0);
    clock.advance(4_999);
    assert!(p.update(&NOMINAL, 0.5, 25.0).is_empty());
    assert!(!p.charge_enabled());

    clock.advance(1);
    let events = p.update(&NOMINAL, 0.5, 25.0);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.transition == Transition::Released));
    assert!(p.charge_enabled());
}

#[test]
fn debounce_restarts_when_release_is_interrupted() {
    let (mut p, clock) = engine();
    p.update(&[3.66, 3.30, 3.30, 3.30], 0.0, 25.0);
    assert!(p.is_fault(FaultChannel::ChargeOvervoltage));

    p.update(&NOMINAL, 0.0, 25.0);
    clock.advance(3_000);
    // 3.50 V sits between release and trip: not releasable, not a new trip
    p.update(&[3.50, 3.30, 3.30, 3.30], 0.0, 25.0);
    assert!(p.channel(FaultChannel::ChargeOvervoltage).recover_since_ms.is_none());

    clock.advance(1_000);
    p.update(&NOMINAL, 0.0, 25.0);
    clock.advance(4_999);
    p.update(&NOMINAL, 0.0, 25.0);
    assert!(p.is_fault(FaultChannel::ChargeOvervoltage));

    clock.advance(1);
    p.update(&NOMINAL, 0.0, 25.0);
    assert!(!p.is_fault(FaultChannel::ChargeOvervoltage));
}

#[test]
fn hysteresis_band_does_not_trip() {
    let (mut p, _clock) = engine();
    p.update(&[3.60, 3.30, 3.30, 3.30], 1.0, 42.0);
    assert!(p.active_faults().is_empty());
}

#[test]
fn undervoltage_cuts_discharge_only() {
    let (mut p, clock) = engine();
    p.update(&[3.20, 2.45, 3.20, 3.20], -1.0, 25.0);
    assert!(p.is_fault(FaultChannel::DischargeUndervoltage));
    assert!(p.charge_enabled());
    assert!(!p.discharge_enabled());

    // 2.80 V is above the trip but below the release
    p.update(&[3.20, 2.80, 3.20, 3.20], 0.0, 25.0);
    clock.advance(10_000);
    p.update(&[3.20, 2.80, 3.20, 3.20], 0.0, 25.0);
    assert!(!p.discharge_enabled());
}

#[test]
fn discharge_overcurrent_trips_on_negative_current() {
    let (mut p, _clock) = engine();
    p.update(&NOMINAL, 6.5, 25.0);
    assert!(!p.is_fault(FaultChannel::DischargeOvercurrent));
    p.update(&NOMINAL, -6.5, 25.0);
    assert!(p.is_fault(FaultChannel::DischargeOvercurrent));
    assert!(!p.discharge_enabled());
}

#[test]
fn temperature_windows_differ_per_side() {
    let (mut p, _clock) = engine();
    p.update(&NOMINAL, 0.0, 50.0);
    assert!(p.is_fault(FaultChannel::ChargeTemperature));
    assert!(!p.is_fault(FaultChannel::DischargeTemperature));

    let (mut p, _clock) = engine();
    p.update(&NOMINAL, 0.0, -5.0);
    assert!(p.is_fault(FaultChannel::ChargeTemperature));
    assert!(!p.is_fault(FaultChannel::DischargeTemperature));

    p.update(&NOMINAL, 0.0, -12.0);
    assert!(p.is_fault(FaultChannel::DischargeTemperature));
    assert!(!p.charge_enabled());
    assert!(!p.discharge_enabled());
}

#[test]
fn clear_all_enables_both_sides_immediately() {
    let (mut p, _clock) = engine();
    p.update(&[3.70, 2.40, 3.30, 3.30], 0.0, 25.0);
    assert!(!p.charge_enabled());
    assert!(!p.discharge_enabled());

    p.clear_all();
    assert!(p.active_faults().is_empty());
    assert!(p.charge_enabled());
    assert!(p.discharge_enabled());

    // Still out of range: trips again on the next tick
    p.update(&[3.70, 2.40, 3.30, 3.30], 0.0, 25.0);
    assert_eq!(p.active_faults().len(), 2);
}

#[test]
fn labels_match_channel_sides() {
    assert_eq!(FaultChannel::ChargeOvervoltage.label(), "CHG OV");
    assert_eq!(FaultChannel::ALL.len(), 6);
}
