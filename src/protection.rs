//! Protection engine
//!
//! Six independent fault channels, each a two-state machine:
//!
//! - **OK → FAULT** as soon as the trip condition holds.
//! - **FAULT → OK** once the release condition has held continuously for
//!   the channel's recovery window. Any tick where it does not hold unsets
//!   the recovery timer.
//!
//! Charge and discharge enables are recomputed from the channel states on
//! every update. There is no terminal fault state.

use crate::clock::Clock;
use crate::config::ProtectionConfig;
use crate::logging::{StructuredLogger, get_logger};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which MOSFET a channel gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Charge,
    Discharge,
}

/// The six protection channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultChannel {
    ChargeOvervoltage,
    ChargeOvercurrent,
    ChargeTemperature,
    DischargeUndervoltage,
    DischargeOvercurrent,
    DischargeTemperature,
}

impl FaultChannel {
    pub const ALL: [FaultChannel; 6] = [
        FaultChannel::ChargeOvervoltage,
        FaultChannel::ChargeOvercurrent,
        FaultChannel::ChargeTemperature,
        FaultChannel::DischargeUndervoltage,
        FaultChannel::DischargeOvercurrent,
        FaultChannel::DischargeTemperature,
    ];

    pub fn side(self) -> Side {
        match self {
            FaultChannel::ChargeOvervoltage
            | FaultChannel::ChargeOvercurrent
            | FaultChannel::ChargeTemperature => Side::Charge,
            FaultChannel::DischargeUndervoltage
            | FaultChannel::DischargeOvercurrent
            | FaultChannel::DischargeTemperature => Side::Discharge,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FaultChannel::ChargeOvervoltage => "CHG OV",
            FaultChannel::ChargeOvercurrent => "CHG OC",
            FaultChannel::ChargeTemperature => "CHG TEMP",
            FaultChannel::DischargeUndervoltage => "DSG UV",
            FaultChannel::DischargeOvercurrent => "DSG OC",
            FaultChannel::DischargeTemperature => "DSG TEMP",
        }
    }

    fn index(self) -> usize {
        match self {
            FaultChannel::ChargeOvervoltage => 0,
            FaultChannel::ChargeOvercurrent => 1,
            FaultChannel::ChargeTemperature => 2,
            FaultChannel::DischargeUndervoltage => 3,
            FaultChannel::DischargeOvercurrent => 4,
            FaultChannel::DischargeTemperature => 5,
        }
    }
}

impl fmt::Display for FaultChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-channel state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub fault: bool,
    /// Time the release condition started holding, unset otherwise
    pub recover_since_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Tripped,
    Released,
}

/// A state change reported by [`ProtectionEngine::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtectionEvent {
    pub channel: FaultChannel,
    pub transition: Transition,
}

/// Trip/release conditions for one channel on one tick
struct Conditions {
    trip: bool,
    release: bool,
    recover_ms: u64,
}

pub struct ProtectionEngine {
    config: ProtectionConfig,
    clock: Arc<dyn Clock>,
    channels: [ChannelStatus; 6],
    charge_enable: bool,
    discharge_enable: bool,
    logger: StructuredLogger,
}

impl ProtectionEngine {
    /// All channels clear, both MOSFETs enabled
    pub fn new(config: ProtectionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            channels: [ChannelStatus::default(); 6],
            charge_enable: true,
            discharge_enable: true,
            logger: get_logger("protection"),
        }
    }

    /// Evaluate every channel against this tick's readings and recompute
    /// the enables. Returns the transitions that happened on this tick.
    pub fn update(
        &mut self,
        cells: &[f64; 4],
        current_a: f64,
        temperature_c: f64,
    ) -> Vec<ProtectionEvent> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        for channel in FaultChannel::ALL {
            let cond = self.conditions(channel, cells, current_a, temperature_c);
            if let Some(transition) = self.step(channel, &cond, now) {
                self.log_transition(channel, transition, cells, current_a, temperature_c);
                events.push(ProtectionEvent {
                    channel,
                    transition,
                });
            }
        }

        self.charge_enable = !self.is_charge_fault();
        self.discharge_enable = !self.is_discharge_fault();
        events
    }

    fn conditions(
        &self,
        channel: FaultChannel,
        cells: &[f64; 4],
        current: f64,
        temp: f64,
    ) -> Conditions {
        let p = &self.config;
        match channel {
            FaultChannel::ChargeOvervoltage => Conditions {
                trip: cells.iter().any(|&v| v >= p.charge_ov_trip_v),
                release: cells.iter().all(|&v| v <= p.charge_ov_release_v),
                recover_ms: p.charge_ov_recover_ms,
            },
            FaultChannel::ChargeOvercurrent => Conditions {
                trip: current >= p.charge_oc_trip_a,
                release: current <= p.charge_oc_release_a,
                recover_ms: p.charge_oc_recover_ms,
            },
            FaultChannel::ChargeTemperature => Conditions {
                trip: temp >= p.charge_temp_high_trip_c || temp <= p.charge_temp_low_trip_c,
                release: temp <= p.charge_temp_high_release_c
                    && temp >= p.charge_temp_low_release_c,
                recover_ms: p.charge_temp_recover_ms,
            },
            FaultChannel::DischargeUndervoltage => Conditions {
                trip: cells.iter().any(|&v| v <= p.discharge_uv_trip_v),
                release: cells.iter().all(|&v| v >= p.discharge_uv_release_v),
                recover_ms: p.discharge_uv_recover_ms,
            },
            FaultChannel::DischargeOvercurrent => Conditions {
                trip: current <= -p.discharge_oc_trip_a,
                release: current >= -p.discharge_oc_release_a,
                recover_ms: p.discharge_oc_recover_ms,
            },
            FaultChannel::DischargeTemperature => Conditions {
                trip: temp >= p.discharge_temp_high_trip_c
                    || temp <= p.discharge_temp_low_trip_c,
                release: temp <= p.discharge_temp_high_release_c
                    && temp >= p.discharge_temp_low_release_c,
                recover_ms: p.discharge_temp_recover_ms,
            },
        }
    }

    fn step(&mut self, channel: FaultChannel, cond: &Conditions, now: u64) -> Option<Transition> {
        let state = &mut self.channels[channel.index()];

        if !state.fault {
            if cond.trip {
                state.fault = true;
                state.recover_since_ms = None;
                return Some(Transition::Tripped);
            }
            return None;
        }

        if !cond.release {
            state.recover_since_ms = None;
            return None;
        }

        let since = *state.recover_since_ms.get_or_insert(now);
        if now.saturating_sub(since) >= cond.recover_ms {
            state.fault = false;
            state.recover_since_ms = None;
            return Some(Transition::Released);
        }
        None
    }

    fn log_transition(
        &self,
        channel: FaultChannel,
        transition: Transition,
        cells: &[f64; 4],
        current: f64,
        temp: f64,
    ) {
        match transition {
            Transition::Tripped => {
                let detail = match channel {
                    FaultChannel::ChargeOvervoltage | FaultChannel::DischargeUndervoltage => {
                        format!(
                            "cells {:.3}/{:.3}/{:.3}/{:.3} V",
                            cells[0], cells[1], cells[2], cells[3]
                        )
                    }
                    FaultChannel::ChargeOvercurrent | FaultChannel::DischargeOvercurrent => {
                        format!("{:.2} A", current)
                    }
                    FaultChannel::ChargeTemperature | FaultChannel::DischargeTemperature => {
                        format!("{:.1} °C", temp)
                    }
                };
                self.logger
                    .warn(&format!("{} protection triggered: {}", channel, detail));
            }
            Transition::Released => {
                self.logger
                    .info(&format!("{} protection recovered", channel));
            }
        }
    }

    /// Manual override: clear every channel and enable both MOSFETs now
    pub fn clear_all(&mut self) {
        self.channels = [ChannelStatus::default(); 6];
        self.charge_enable = true;
        self.discharge_enable = true;
        self.logger
            .warn("All protection faults cleared manually; MOSFETs enabled");
    }

    pub fn channel(&self, channel: FaultChannel) -> ChannelStatus {
        self.channels[channel.index()]
    }

    pub fn is_fault(&self, channel: FaultChannel) -> bool {
        self.channels[channel.index()].fault
    }

    pub fn active_faults(&self) -> Vec<FaultChannel> {
        FaultChannel::ALL
            .into_iter()
            .filter(|c| self.is_fault(*c))
            .collect()
    }

    pub fn is_charge_fault(&self) -> bool {
        FaultChannel::ALL
            .iter()
            .any(|c| c.side() == Side::Charge && self.is_fault(*c))
    }

    pub fn is_discharge_fault(&self) -> bool {
        FaultChannel::ALL
            .iter()
            .any(|c| c.side() == Side::Discharge && self.is_fault(*c))
    }

    pub fn charge_enabled(&self) -> bool {
        self.charge_enable
    }

    pub fn discharge_enabled(&self) -> bool {
        self.discharge_enable
    }
}
