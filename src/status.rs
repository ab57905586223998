//! Status snapshot published by the controller
//!
//! A snapshot is rebuilt from scratch on every aggregation tick and handed
//! out behind an `Arc`; readers never see a partially updated value.

use crate::config::AlarmConfig;
use crate::protection::{FaultChannel, ProtectionEngine};
use crate::sensors::PackMeasurement;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

/// Current direction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Charging,
    Discharging,
    Idle,
}

impl ChargeState {
    pub fn classify(current_a: f64, deadband_a: f64) -> Self {
        if current_a > deadband_a {
            ChargeState::Charging
        } else if current_a < -deadband_a {
            ChargeState::Discharging
        } else {
            ChargeState::Idle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChargeState::Charging => "charging",
            ChargeState::Discharging => "discharging",
            ChargeState::Idle => "idle",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlarmPair {
    pub warning: bool,
    pub alarm: bool,
}

impl AlarmPair {
    fn merge(self, other: AlarmPair) -> AlarmPair {
        AlarmPair {
            warning: self.warning || other.warning,
            alarm: self.alarm || other.alarm,
        }
    }
}

/// Display-oriented warning/alarm flags. These use their own thresholds
/// and never drive the MOSFETs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisplayAlarms {
    pub cell_overvoltage: AlarmPair,
    pub cell_undervoltage: AlarmPair,
    pub charge_overcurrent: AlarmPair,
    pub discharge_overcurrent: AlarmPair,
    pub charge_over_temperature: AlarmPair,
    pub charge_under_temperature: AlarmPair,
    pub discharge_over_temperature: AlarmPair,
    pub discharge_under_temperature: AlarmPair,
}

impl DisplayAlarms {
    /// Current alarms only count in their own direction; temperature is
    /// checked against both windows whatever the direction.
    pub fn evaluate(m: &PackMeasurement, state: ChargeState, cfg: &AlarmConfig) -> Self {
        let mut alarms = DisplayAlarms::default();

        for &v in &m.cells {
            alarms.cell_overvoltage.warning |= v > cfg.cell_ov_warning_v;
            alarms.cell_overvoltage.alarm |= v > cfg.cell_ov_alarm_v;
            alarms.cell_undervoltage.warning |= v < cfg.cell_uv_warning_v;
            alarms.cell_undervoltage.alarm |= v < cfg.cell_uv_alarm_v;
        }

        let i = m.current;
        if state == ChargeState::Charging {
            alarms.charge_overcurrent = AlarmPair {
                warning: i > cfg.charge_current_warning_a,
                alarm: i > cfg.charge_current_alarm_a,
            };
        }
        if state == ChargeState::Discharging {
            alarms.discharge_overcurrent = AlarmPair {
                warning: i < -cfg.discharge_current_warning_a,
                alarm: i < -cfg.discharge_current_alarm_a,
            };
        }

        let t = m.temperature;
        alarms.charge_over_temperature = AlarmPair {
            warning: t > cfg.charge_temp_high_warning_c,
            alarm: t >= cfg.charge_temp_high_alarm_c,
        };
        alarms.charge_under_temperature = AlarmPair {
            warning: t < cfg.charge_temp_low_warning_c,
            alarm: t <= cfg.charge_temp_low_alarm_c,
        };
        alarms.discharge_over_temperature = AlarmPair {
            warning: t > cfg.discharge_temp_high_warning_c,
            alarm: t >= cfg.discharge_temp_high_alarm_c,
        };
        alarms.discharge_under_temperature = AlarmPair {
            warning: t < cfg.discharge_temp_low_warning_c,
            alarm: t <= cfg.discharge_temp_low_alarm_c,
        };

        alarms
    }

    pub fn charge_temperature(&self) -> AlarmPair {
        self.charge_over_temperature
            .merge(self.charge_under_temperature)
    }

    pub fn discharge_temperature(&self) -> AlarmPair {
        self.discharge_over_temperature
            .merge(self.discharge_under_temperature)
    }

    /// The display pair matching a protection channel
    pub fn for_channel(&self, channel: FaultChannel) -> AlarmPair {
        match channel {
            FaultChannel::ChargeOvervoltage => self.cell_overvoltage,
            FaultChannel::ChargeOvercurrent => self.charge_overcurrent,
            FaultChannel::ChargeTemperature => self.charge_temperature(),
            FaultChannel::DischargeUndervoltage => self.cell_undervoltage,
            FaultChannel::DischargeOvercurrent => self.discharge_overcurrent,
            FaultChannel::DischargeTemperature => self.discharge_temperature(),
        }
    }

    pub fn any_alarm(&self) -> bool {
        FaultChannel::ALL.iter().any(|c| self.for_channel(*c).alarm)
    }

    pub fn any_warning(&self) -> bool {
        FaultChannel::ALL.iter().any(|c| self.for_channel(*c).warning)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SocStatus {
    pub initialized: bool,
    pub soc: f64,
    pub ocv_soc: f64,
    pub coulomb_counter_mah: f64,
    pub capacity_mah: f64,
    pub temperature_factor: f64,
    pub idle: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SohStatus {
    pub soh: f64,
    pub remaining_capacity_ah: f64,
    pub total_cycles: f64,
    pub remaining_cycles: f64,
    pub equivalent_full_cycles: f64,
    pub end_of_life: bool,
}

/// Protection engine state as seen by consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionStatus {
    pub charge_overvoltage: bool,
    pub charge_overcurrent: bool,
    pub charge_temperature: bool,
    pub discharge_undervoltage: bool,
    pub discharge_overcurrent: bool,
    pub discharge_temperature: bool,
    pub charge_enable: bool,
    pub discharge_enable: bool,
}

impl ProtectionStatus {
    pub fn from_engine(engine: &ProtectionEngine) -> Self {
        Self {
            charge_overvoltage: engine.is_fault(FaultChannel::ChargeOvervoltage),
            charge_overcurrent: engine.is_fault(FaultChannel::ChargeOvercurrent),
            charge_temperature: engine.is_fault(FaultChannel::ChargeTemperature),
            discharge_undervoltage: engine.is_fault(FaultChannel::DischargeUndervoltage),
            discharge_overcurrent: engine.is_fault(FaultChannel::DischargeOvercurrent),
            discharge_temperature: engine.is_fault(FaultChannel::DischargeTemperature),
            charge_enable: engine.charge_enabled(),
            discharge_enable: engine.discharge_enabled(),
        }
    }

    pub fn is_fault(&self, channel: FaultChannel) -> bool {
        match channel {
            FaultChannel::ChargeOvervoltage => self.charge_overvoltage,
            FaultChannel::ChargeOvercurrent => self.charge_overcurrent,
            FaultChannel::ChargeTemperature => self.charge_temperature,
            FaultChannel::DischargeUndervoltage => self.discharge_undervoltage,
            FaultChannel::DischargeOvercurrent => self.discharge_overcurrent,
            FaultChannel::DischargeTemperature => self.discharge_temperature,
        }
    }

    pub fn any_fault(&self) -> bool {
        FaultChannel::ALL.iter().any(|c| self.is_fault(*c))
    }
}

impl Default for ProtectionStatus {
    fn default() -> Self {
        Self {
            charge_overvoltage: false,
            charge_overcurrent: false,
            charge_temperature: false,
            discharge_undervoltage: false,
            discharge_overcurrent: false,
            discharge_temperature: false,
            charge_enable: true,
            discharge_enable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalancingStatus {
    pub active: bool,
    /// 1-based cell selected for the current run
    pub target_cell: Option<u8>,
    /// 1-based cells bleeding right now (at most one)
    pub bleeding_cells: Vec<u8>,
    pub phase_remaining_ms: Option<u64>,
}

/// Everything consumers need, rebuilt each aggregation tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_ms: u64,
    /// Incremented on every publication
    pub sequence: u64,
    pub measurement: PackMeasurement,
    pub charge_state: ChargeState,
    pub soc: SocStatus,
    pub soh: SohStatus,
    pub alarms: DisplayAlarms,
    pub protection: ProtectionStatus,
    pub balancing: BalancingStatus,
}

impl StatusSnapshot {
    /// Placeholder published before the first sensor read
    pub fn initial() -> Self {
        Self {
            timestamp: Utc::now(),
            uptime_ms: 0,
            sequence: 0,
            measurement: PackMeasurement::default(),
            charge_state: ChargeState::Idle,
            soc: SocStatus::default(),
            soh: SohStatus {
                soh: 100.0,
                ..Default::default()
            },
            alarms: DisplayAlarms::default(),
            protection: ProtectionStatus::default(),
            balancing: BalancingStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    fn new(severity: AlertSeverity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
        }
    }
}

/// Operator-facing alerts, most severe first
pub fn alerts(s: &StatusSnapshot) -> Vec<Alert> {
    use AlertSeverity::{Critical, Info, Warning};

    let a = &s.alarms;
    let mut out = Vec::new();

    let critical = [
        (a.cell_overvoltage.alarm, "Charging cut: cell voltage too high"),
        (a.cell_undervoltage.alarm, "Discharging cut: cell voltage too low"),
        (a.charge_overcurrent.alarm, "Charging cut: charge current too high"),
        (a.discharge_overcurrent.alarm, "Discharging cut: discharge current too high"),
        (a.charge_over_temperature.alarm, "Charging cut: temperature too high"),
        (a.charge_under_temperature.alarm, "Charging cut: temperature too low"),
        (a.discharge_over_temperature.alarm, "Discharging cut: temperature too high"),
        (a.discharge_under_temperature.alarm, "Discharging cut: temperature too low"),
    ];
    let warning = [
        (a.cell_overvoltage.warning, "Cell voltage high"),
        (a.cell_undervoltage.warning, "Cell voltage low"),
        (a.charge_overcurrent.warning, "Charge current high"),
        (a.discharge_overcurrent.warning, "Discharge current high"),
        (a.charge_over_temperature.warning, "Charge temperature high"),
        (a.charge_under_temperature.warning, "Charge temperature low"),
        (a.discharge_over_temperature.warning, "Discharge temperature high"),
        (a.discharge_under_temperature.warning, "Discharge temperature low"),
        (s.soh.end_of_life, "Battery approaching end of life"),
    ];

    out.extend(
        critical
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, msg)| Alert::new(Critical, msg)),
    );
    out.extend(
        warning
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, msg)| Alert::new(Warning, msg)),
    );

    for channel in FaultChannel::ALL {
        if s.protection.is_fault(channel) {
            out.push(Alert {
                severity: Warning,
                message: format!("{} protection active", channel),
            });
        }
    }
    if let Some(cell) = s.balancing.target_cell {
        out.push(Alert {
            severity: Info,
            message: format!("Balancing cell {}", cell),
        });
    }
    out
}

fn status_str(alarm: bool) -> &'static str {
    if alarm { "alarm" } else { "normal" }
}

/// Dashboard document served at `/bms`. Numbers are pre-formatted strings
/// with fixed precision, which the dashboard renders verbatim.
pub fn dashboard_json(s: &StatusSnapshot) -> Value {
    let m = &s.measurement;
    let a = &s.alarms;

    let cells: Vec<Value> = m
        .cells
        .iter()
        .enumerate()
        .map(|(i, v)| json!({ "cell": i + 1, "voltage": format!("{:.3}", v) }))
        .collect();

    json!({
        "measurement": {
            "cellVoltages": cells,
            "packVoltage": format!("{:.2}", m.pack_voltage),
            "avgCellVoltage": format!("{:.3}", m.average_cell),
            "current": format!("{:.2}", m.current),
            "packTemperature": format!("{:.1}", m.temperature),
        },
        "calculation": {
            "soc": format!("{:.1}", s.soc.soc),
            "soh": format!("{:.1}", s.soh.soh),
            "remainingCapacity": format!("{:.3}", s.soh.remaining_capacity_ah),
            "totalCycles": format!("{:.1}", s.soh.total_cycles),
            "remainingCycles": format!("{:.0}", s.soh.remaining_cycles),
        },
        "status": {
            "charging": s.charge_state.as_str(),
            "chargeMosfet": s.protection.charge_enable,
            "dischargeMosfet": s.protection.discharge_enable,
            "balancing": {
                "active": s.balancing.active,
                "cells": s.balancing.bleeding_cells,
            },
        },
        "protection": {
            "overVoltage": status_str(a.cell_overvoltage.alarm),
            "underVoltage": status_str(a.cell_undervoltage.alarm),
            "overCurrentCharge": status_str(a.charge_overcurrent.alarm),
            "overCurrentDischarge": status_str(a.discharge_overcurrent.alarm),
            "overTempCharge": status_str(a.charge_over_temperature.alarm),
            "overTempDischarge": status_str(a.discharge_over_temperature.alarm),
            "underTempCharge": status_str(a.charge_under_temperature.alarm),
            "underTempDischarge": status_str(a.discharge_under_temperature.alarm),
        },
        "alerts": alerts(s),
        "timestamp": s.timestamp.to_rfc3339(),
    })
}
