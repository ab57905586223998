//! State-of-health estimation
//!
//! SOH follows a linear fade model driven by equivalent full cycles, which
//! are counted from the SOC trace. Counters survive restarts through a
//! [`SohStore`]; periodic saves are rate limited.

use crate::clock::Clock;
use crate::config::SohConfig;
use crate::error::{BmsError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{SohRecord, SohStore};
use serde::Serialize;
use std::sync::Arc;

/// Direction of the SOC trace as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleDirection {
    Unknown,
    Charging,
    Discharging,
}

/// Cycle-counting state-of-health estimator
pub struct SohEstimator {
    nominal_capacity_ah: f64,
    config: SohConfig,
    store: Box<dyn SohStore>,
    clock: Arc<dyn Clock>,

    soh: f64,
    total_cycles: f64,
    equivalent_full_cycles: f64,
    current_capacity_ah: f64,

    last_soc: Option<f64>,
    cycle_depth_accum: f64,
    direction: CycleDirection,
    last_save_ms: u64,

    logger: StructuredLogger,
}

impl SohEstimator {
    pub fn new(
        nominal_capacity_ah: f64,
        config: SohConfig,
        store: Box<dyn SohStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            nominal_capacity_ah,
            config,
            store,
            clock,
            soh: 100.0,
            total_cycles: 0.0,
            equivalent_full_cycles: 0.0,
            current_capacity_ah: nominal_capacity_ah,
            last_soc: None,
            cycle_depth_accum: 0.0,
            direction: CycleDirection::Unknown,
            last_save_ms: 0,
            logger: get_logger("soh"),
        }
    }

    /// Load persisted counters. Missing keys, a missing record or an
    /// unreadable store all fall back to defaults.
    pub fn begin(&mut self) {
        let record = match self.store.load() {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to load SOH state, using defaults: {}", e));
                SohRecord::default()
            }
        };

        self.soh = record.soh.unwrap_or(100.0).clamp(0.0, 100.0);
        self.total_cycles = record.total_cycles.unwrap_or(0.0).max(0.0);
        self.equivalent_full_cycles = record.equivalent_full_cycles.unwrap_or(0.0).max(0.0);
        // Capacity always follows the loaded SOH, whatever the record says
        self.current_capacity_ah = self.nominal_capacity_ah * self.soh / 100.0;
        if let Some(stored) = record.current_capacity
            && (stored - self.current_capacity_ah).abs() > 1e-6
        {
            self.logger.warn(&format!(
                "Stored capacity {:.3} Ah disagrees with SOH, using {:.3} Ah",
                stored, self.current_capacity_ah
            ));
        }

        self.logger.info(&format!(
            "SOH loaded: {:.1}% | {:.1} cycles",
            self.soh, self.total_cycles
        ));
    }

    /// Accumulate SOC movement into cycle depth; every 100 points of
    /// movement is one equivalent full cycle.
    pub fn detect_cycle(&mut self, current_soc: f64) {
        let Some(last) = self.last_soc else {
            self.last_soc = Some(current_soc);
            return;
        };

        let delta = current_soc - last;
        if delta > 0.0 {
            self.direction = CycleDirection::Charging;
            self.cycle_depth_accum += delta;
        } else if delta < 0.0 {
            self.direction = CycleDirection::Discharging;
            self.cycle_depth_accum += delta.abs();
        }

        if self.cycle_depth_accum >= 100.0 {
            let added = self.cycle_depth_accum / 100.0;
            self.equivalent_full_cycles += added;
            self.total_cycles += added;
            self.cycle_depth_accum = 0.0;
            self.logger.info(&format!(
                "+{:.2} cycles | total {:.1}",
                added, self.total_cycles
            ));
        }

        self.last_soc = Some(current_soc);
    }

    /// Linear fade: `100 - cycles * aging_rate`, clamped to [0, 100]
    pub fn soh_from_cycles(&self, cycles: f64) -> f64 {
        (100.0 - cycles * self.config.aging_rate_per_cycle).clamp(0.0, 100.0)
    }

    /// Feed the latest SOC, recompute SOH and save if the interval elapsed
    pub fn update(&mut self, current_soc: f64, _temperature_c: f64) {
        let now = self.clock.now_ms();

        self.detect_cycle(current_soc);
        self.soh = self.soh_from_cycles(self.total_cycles);
        self.current_capacity_ah = self.nominal_capacity_ah * self.soh / 100.0;

        if now.saturating_sub(self.last_save_ms) >= self.config.save_interval_ms {
            self.save();
            self.last_save_ms = now;
        }
    }

    /// Zero the cycle counters. SOH and capacity follow on the next update.
    pub fn reset_cycles(&mut self) {
        self.total_cycles = 0.0;
        self.equivalent_full_cycles = 0.0;
        self.cycle_depth_accum = 0.0;
        self.save();
        self.logger.info("Cycles reset");
    }

    /// Back to a new pack: SOH 100 %, no cycles
    pub fn reset_soh(&mut self) {
        self.soh = 100.0;
        self.total_cycles = 0.0;
        self.equivalent_full_cycles = 0.0;
        self.cycle_depth_accum = 0.0;
        self.current_capacity_ah = self.nominal_capacity_ah;
        self.save();
        self.logger.info("SOH reset to 100%");
    }

    /// Override the cycle-counted estimate with a measured capacity
    pub fn calibrate_from_capacity(&mut self, measured_ah: f64) -> Result<()> {
        if !measured_ah.is_finite() || measured_ah <= 0.0 {
            return Err(BmsError::validation(
                "capacity_ah",
                format!("Measured capacity must be positive, got {}", measured_ah),
            ));
        }

        self.soh = (measured_ah / self.nominal_capacity_ah * 100.0).clamp(0.0, 100.0);
        self.current_capacity_ah = self.nominal_capacity_ah * self.soh / 100.0;
        self.total_cycles = (100.0 - self.soh) / self.config.aging_rate_per_cycle;
        self.save();

        self.logger.info(&format!(
            "SOH calibrated: {:.1}% ({:.2} Ah)",
            self.soh, self.current_capacity_ah
        ));
        Ok(())
    }

    /// Persist the current counters; failures are logged, not returned
    pub fn save(&mut self) {
        let record = self.record();
        if let Err(e) = self.store.save(&record) {
            self.logger.error(&format!("Failed to save SOH state: {}", e));
        }
    }

    pub fn record(&self) -> SohRecord {
        SohRecord {
            soh: Some(self.soh),
            total_cycles: Some(self.total_cycles),
            equivalent_full_cycles: Some(self.equivalent_full_cycles),
            current_capacity: Some(self.current_capacity_ah),
        }
    }

    pub fn soh(&self) -> f64 {
        self.soh
    }

    pub fn total_cycles(&self) -> f64 {
        self.total_cycles
    }

    pub fn equivalent_full_cycles(&self) -> f64 {
        self.equivalent_full_cycles
    }

    pub fn current_capacity_ah(&self) -> f64 {
        self.current_capacity_ah
    }

    pub fn nominal_capacity_ah(&self) -> f64 {
        self.nominal_capacity_ah
    }

    pub fn cycle_depth(&self) -> f64 {
        self.cycle_depth_accum
    }

    pub fn direction(&self) -> CycleDirection {
        self.direction
    }

    pub fn remaining_cycles(&self) -> f64 {
        (self.config.rated_cycles - self.total_cycles).max(0.0)
    }

    pub fn end_of_life(&self) -> bool {
        self.soh < self.config.end_of_life_soh
    }
}
