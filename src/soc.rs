//! State-of-charge estimation
//!
//! Coulomb counting is the primary signal. The OCV table seeds the estimate
//! at boot and nudges it back during long rest periods; a full-charge snap
//! re-anchors at 100 % after a genuine top-off followed by rest.

use crate::clock::Clock;
use crate::config::SocConfig;
use crate::logging::{StructuredLogger, get_logger};
use crate::table::{LookupTable, default_ocv_table, default_temperature_table};
use serde::Serialize;
use std::sync::Arc;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Snapshot of estimator internals for operator diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocDiagnostics {
    pub soc: f64,
    pub ocv_soc: f64,
    pub error: f64,
    pub coulomb_counter_mah: f64,
    pub capacity_mah: f64,
    pub temperature_c: f64,
    pub temperature_factor: f64,
    pub idle: bool,
    pub charged_full_this_cycle: bool,
}

impl SocDiagnostics {
    /// Disagreement between counted and OCV SOC worth a calibration check
    pub fn large_error(&self) -> bool {
        self.error > 10.0
    }
}

/// Hybrid coulomb-counting / OCV state-of-charge estimator
pub struct SocEstimator {
    capacity_mah: f64,
    config: SocConfig,
    ocv_table: LookupTable,
    temperature_table: LookupTable,
    clock: Arc<dyn Clock>,

    soc: f64,
    coulomb_counter_mah: f64,
    last_update_ms: u64,
    initialized: bool,

    is_idle: bool,
    idle_start_ms: u64,
    charged_full_this_cycle: bool,

    logger: StructuredLogger,
}

impl SocEstimator {
    /// Create an uninitialized estimator. Call
    /// [`initialize_from_voltage`](Self::initialize_from_voltage) before
    /// the first [`update`](Self::update).
    pub fn new(capacity_ah: f64, config: SocConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity_mah = capacity_ah * 1000.0;
        Self {
            capacity_mah,
            config,
            ocv_table: default_ocv_table(),
            temperature_table: default_temperature_table(),
            clock,
            soc: 50.0,
            coulomb_counter_mah: capacity_mah * 0.5,
            last_update_ms: 0,
            initialized: false,
            is_idle: false,
            idle_start_ms: 0,
            charged_full_this_cycle: false,
            logger: get_logger("soc"),
        }
    }

    /// Replace the OCV and temperature tables (pack chemistry variants, tests)
    pub fn with_tables(mut self, ocv: LookupTable, temperature: LookupTable) -> Self {
        self.ocv_table = ocv;
        self.temperature_table = temperature;
        self
    }

    /// Seed SOC from the resting pack voltage. No-op once initialized.
    pub fn initialize_from_voltage(&mut self, pack_voltage: f64) {
        if self.initialized {
            return;
        }

        self.soc = self.ocv_to_soc(pack_voltage);
        self.coulomb_counter_mah = self.soc / 100.0 * self.capacity_mah;
        self.last_update_ms = self.clock.now_ms();
        self.initialized = true;

        self.logger.info(&format!(
            "Initialized from {:.3} V: SOC {:.1}% ({:.1} Ah pack)",
            pack_voltage,
            self.soc,
            self.capacity_mah / 1000.0
        ));
    }

    /// Integrate current since the previous call and recompute SOC
    pub fn update(&mut self, current_a: f64, temperature_c: f64) {
        if !self.initialized {
            self.logger
                .warn("Update skipped: estimator not initialized from voltage");
            return;
        }

        let now = self.clock.now_ms();
        let elapsed_ms = now.saturating_sub(self.last_update_ms);
        self.last_update_ms = now;

        let dt_s = (elapsed_ms as f64 / 1000.0).min(self.config.max_dt_s);
        self.coulomb_counter_mah += current_a * 1000.0 * (dt_s * 1000.0 / MS_PER_HOUR);

        let effective_capacity = self.capacity_mah * self.temperature_factor(temperature_c);
        if effective_capacity <= 0.0 {
            return;
        }
        self.soc = self.coulomb_counter_mah / effective_capacity * 100.0;

        if self.soc > 100.0 {
            self.soc = 100.0;
        }
        if self.soc < 0.0 {
            self.soc = 0.0;
            self.coulomb_counter_mah = 0.0;
        }
    }

    /// Pack OCV to SOC (%), clamped to 0/100 outside the table
    pub fn ocv_to_soc(&self, voltage: f64) -> f64 {
        self.ocv_table.lookup(voltage).clamp(0.0, 100.0)
    }

    /// Usable-capacity factor at the given temperature
    pub fn temperature_factor(&self, temperature_c: f64) -> f64 {
        self.temperature_table.lookup(temperature_c)
    }

    /// Idle tracking plus the full-charge snap and long-idle OCV blend
    pub fn recalibrate(&mut self, pack_voltage: f64, current_a: f64) {
        let now = self.clock.now_ms();
        let idle_now = current_a.abs() < self.config.idle_current_a;

        if idle_now {
            if !self.is_idle {
                self.is_idle = true;
                self.idle_start_ms = now;
            }
        } else {
            self.is_idle = false;
        }

        let idle_ms = if self.is_idle {
            now.saturating_sub(self.idle_start_ms)
        } else {
            0
        };

        if pack_voltage >= self.config.full_charge_arm_v && current_a > 0.0 {
            if !self.charged_full_this_cycle {
                self.logger
                    .debug(&format!("Full charge armed at {:.2} V", pack_voltage));
            }
            self.charged_full_this_cycle = true;
        }
        if pack_voltage <= self.config.full_charge_disarm_v {
            self.charged_full_this_cycle = false;
        }

        if self.charged_full_this_cycle
            && idle_now
            && pack_voltage >= self.config.recalibration_full_v
            && idle_ms >= self.config.full_dwell_ms
        {
            if (self.soc - 100.0).abs() > 2.0 {
                self.logger.info(&format!(
                    "Recalibrated to full: SOC {:.1}% -> 100%",
                    self.soc
                ));
            }
            self.soc = 100.0;
            self.coulomb_counter_mah = self.capacity_mah;
        }

        if self.is_idle && idle_ms > self.config.ocv_sync_dwell_ms {
            let ocv_soc = self.ocv_to_soc(pack_voltage);
            if (ocv_soc - self.soc).abs() > self.config.ocv_error_band {
                let alpha = self.config.ocv_blend_alpha;
                let blended = (self.soc * alpha + ocv_soc * (1.0 - alpha)).clamp(0.0, 100.0);
                self.logger.info(&format!(
                    "OCV sync: SOC {:.1}% | OCV {:.1}% -> {:.1}%",
                    self.soc, ocv_soc, blended
                ));
                self.soc = blended;
                self.coulomb_counter_mah = self.soc / 100.0 * self.capacity_mah;
                self.idle_start_ms = now;
            }
        }
    }

    /// Force SOC to `new_soc` (clamped) and re-derive the coulomb counter
    pub fn reset(&mut self, new_soc: f64) {
        self.soc = if new_soc.is_nan() {
            0.0
        } else {
            new_soc.clamp(0.0, 100.0)
        };
        self.coulomb_counter_mah = self.soc / 100.0 * self.capacity_mah;
        self.logger.info(&format!("SOC reset to {:.1}%", self.soc));
    }

    pub fn soc(&self) -> f64 {
        self.soc
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn charged_full_this_cycle(&self) -> bool {
        self.charged_full_this_cycle
    }

    pub fn coulomb_counter_mah(&self) -> f64 {
        self.coulomb_counter_mah
    }

    pub fn capacity_mah(&self) -> f64 {
        self.capacity_mah
    }

    pub fn diagnostics(&self, pack_voltage: f64, temperature_c: f64) -> SocDiagnostics {
        let ocv_soc = self.ocv_to_soc(pack_voltage);
        SocDiagnostics {
            soc: self.soc,
            ocv_soc,
            error: (self.soc - ocv_soc).abs(),
            coulomb_counter_mah: self.coulomb_counter_mah,
            capacity_mah: self.capacity_mah,
            temperature_c,
            temperature_factor: self.temperature_factor(temperature_c),
            idle: self.is_idle,
            charged_full_this_cycle: self.charged_full_this_cycle,
        }
    }
}
