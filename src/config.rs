//! Configuration management for LFP-BMS
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Every section carries defaults for a
//! 4S 6 Ah LiFePO4 pack, so a partial file only needs to list overrides.

use crate::error::{BmsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Battery pack parameters
    pub pack: PackConfig,

    /// SOC estimator tuning
    pub soc: SocConfig,

    /// SOH estimator tuning and persistence
    pub soh: SohConfig,

    /// Protection engine trip/release thresholds
    pub protection: ProtectionConfig,

    /// Display-oriented warning/alarm thresholds
    pub alarms: AlarmConfig,

    /// Balancing controller parameters
    pub balancing: BalancingConfig,

    /// Scheduling loop intervals
    pub schedule: ScheduleConfig,

    /// Simulated sensor readings used by the bundled binary
    pub sensors: SimulatedSensorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Command console configuration
    pub console: ConsoleConfig,
}

/// Battery pack parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Rated capacity in ampere-hours
    pub nominal_capacity_ah: f64,
}

/// SOC estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocConfig {
    /// Current magnitude below which the pack counts as idle (A)
    pub idle_current_a: f64,

    /// Upper bound on the integration step per update (seconds)
    pub max_dt_s: f64,

    /// Pack voltage that, seen while charging, arms the full-charge snap (V)
    pub full_charge_arm_v: f64,

    /// Pack voltage the idle pack must hold for the full-charge snap (V)
    pub recalibration_full_v: f64,

    /// Pack voltage at or below which the full-charge arm is dropped (V)
    pub full_charge_disarm_v: f64,

    /// Idle dwell before the full-charge snap may fire (ms)
    pub full_dwell_ms: u64,

    /// Idle dwell before the OCV blend may fire (ms)
    pub ocv_sync_dwell_ms: u64,

    /// Minimum OCV/coulomb disagreement that triggers a blend (percentage points)
    pub ocv_error_band: f64,

    /// Weight kept on the coulomb-counted SOC when blending (0..1)
    pub ocv_blend_alpha: f64,
}

/// SOH estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SohConfig {
    /// Capacity loss per equivalent full cycle (% SOH per cycle)
    pub aging_rate_per_cycle: f64,

    /// Rated cycle life used for remaining-cycle estimates
    pub rated_cycles: f64,

    /// SOH below which the pack is reported as end of life (%)
    pub end_of_life_soh: f64,

    /// Minimum time between periodic saves (ms)
    pub save_interval_ms: u64,

    /// Path of the JSON state file
    pub state_file: String,

    /// Namespace key inside the state file
    pub namespace: String,
}

/// Protection engine thresholds. Voltages are per cell, currents are
/// magnitudes in amperes, temperatures in degrees Celsius.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    pub charge_ov_trip_v: f64,
    pub charge_ov_release_v: f64,
    pub charge_ov_recover_ms: u64,

    pub charge_oc_trip_a: f64,
    pub charge_oc_release_a: f64,
    pub charge_oc_recover_ms: u64,

    pub charge_temp_high_trip_c: f64,
    pub charge_temp_high_release_c: f64,
    pub charge_temp_low_trip_c: f64,
    pub charge_temp_low_release_c: f64,
    pub charge_temp_recover_ms: u64,

    pub discharge_uv_trip_v: f64,
    pub discharge_uv_release_v: f64,
    pub discharge_uv_recover_ms: u64,

    pub discharge_oc_trip_a: f64,
    pub discharge_oc_release_a: f64,
    pub discharge_oc_recover_ms: u64,

    pub discharge_temp_high_trip_c: f64,
    pub discharge_temp_high_release_c: f64,
    pub discharge_temp_low_trip_c: f64,
    pub discharge_temp_low_release_c: f64,
    pub discharge_temp_recover_ms: u64,
}

/// Display warning/alarm thresholds, separate from the protection trips
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Current deadband for the charging/discharging/idle classification (A)
    pub direction_deadband_a: f64,

    pub cell_ov_warning_v: f64,
    pub cell_ov_alarm_v: f64,
    pub cell_uv_warning_v: f64,
    pub cell_uv_alarm_v: f64,

    pub charge_current_warning_a: f64,
    pub charge_current_alarm_a: f64,
    pub discharge_current_warning_a: f64,
    pub discharge_current_alarm_a: f64,

    pub charge_temp_high_warning_c: f64,
    pub charge_temp_high_alarm_c: f64,
    pub charge_temp_low_warning_c: f64,
    pub charge_temp_low_alarm_c: f64,

    pub discharge_temp_high_warning_c: f64,
    pub discharge_temp_high_alarm_c: f64,
    pub discharge_temp_low_warning_c: f64,
    pub discharge_temp_low_alarm_c: f64,
}

/// Balancing controller parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancingConfig {
    /// Current magnitude below which balancing is allowed (A)
    pub idle_current_a: f64,

    /// Cell spread that starts balancing (V)
    pub start_delta_v: f64,

    /// Cell spread at or below which balancing stops (V)
    pub stop_delta_v: f64,

    /// Highest cell must be at least this voltage to balance (V)
    pub min_cell_v: f64,

    /// Bleed ON phase duration (ms)
    pub on_ms: u64,

    /// Bleed OFF phase duration (ms)
    pub off_ms: u64,
}

/// Scheduling loop intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Sensor read, protection, balancing and snapshot publication (ms)
    pub aggregate_interval_ms: u64,

    /// SOC update and recalibration (ms)
    pub soc_interval_ms: u64,

    /// SOH update (ms)
    pub soh_interval_ms: u64,
}

/// Readings served by the simulated sensor source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedSensorConfig {
    pub cell_voltages: [f64; 4],
    pub current_a: f64,
    pub temperature_c: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Whether to start the HTTP server
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Command console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Whether to read commands from stdin
    pub enabled: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "lfp_bms.yaml",
            "/data/lfp_bms.yaml",
            "/etc/lfp-bms/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.pack.nominal_capacity_ah > 0.0) {
            return Err(BmsError::validation(
                "pack.nominal_capacity_ah",
                "Must be positive",
            ));
        }

        let alpha = self.soc.ocv_blend_alpha;
        if !(0.0..1.0).contains(&alpha) {
            return Err(BmsError::validation(
                "soc.ocv_blend_alpha",
                "Must be in [0, 1)",
            ));
        }
        if self.soc.max_dt_s <= 0.0 {
            return Err(BmsError::validation("soc.max_dt_s", "Must be positive"));
        }

        if self.soh.aging_rate_per_cycle <= 0.0 {
            return Err(BmsError::validation(
                "soh.aging_rate_per_cycle",
                "Must be positive",
            ));
        }
        if self.soh.namespace.is_empty() {
            return Err(BmsError::validation(
                "soh.namespace",
                "Namespace cannot be empty",
            ));
        }

        self.validate_protection()?;

        let b = &self.balancing;
        if b.stop_delta_v >= b.start_delta_v {
            return Err(BmsError::validation(
                "balancing.stop_delta_v",
                "Must be below balancing.start_delta_v",
            ));
        }
        if b.on_ms == 0 || b.off_ms == 0 {
            return Err(BmsError::validation(
                "balancing.on_ms",
                "Phase durations must be greater than 0",
            ));
        }

        let s = &self.schedule;
        if s.aggregate_interval_ms == 0 || s.soc_interval_ms == 0 || s.soh_interval_ms == 0 {
            return Err(BmsError::validation(
                "schedule",
                "Intervals must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(BmsError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Release thresholds must sit on the safe side of their trips,
    /// otherwise a channel could never recover.
    fn validate_protection(&self) -> Result<()> {
        let p = &self.protection;
        let checks = [
            (
                p.charge_ov_release_v < p.charge_ov_trip_v,
                "protection.charge_ov_release_v",
            ),
            (
                p.charge_oc_release_a < p.charge_oc_trip_a,
                "protection.charge_oc_release_a",
            ),
            (
                p.charge_temp_high_release_c < p.charge_temp_high_trip_c
                    && p.charge_temp_low_release_c > p.charge_temp_low_trip_c
                    && p.charge_temp_low_release_c <= p.charge_temp_high_release_c,
                "protection.charge_temp",
            ),
            (
                p.discharge_uv_release_v > p.discharge_uv_trip_v,
                "protection.discharge_uv_release_v",
            ),
            (
                p.discharge_oc_release_a < p.discharge_oc_trip_a,
                "protection.discharge_oc_release_a",
            ),
            (
                p.discharge_temp_high_release_c < p.discharge_temp_high_trip_c
                    && p.discharge_temp_low_release_c > p.discharge_temp_low_trip_c
                    && p.discharge_temp_low_release_c <= p.discharge_temp_high_release_c,
                "protection.discharge_temp",
            ),
        ];
        for (ok, field) in checks {
            if !ok {
                return Err(BmsError::validation(
                    field,
                    "Release threshold must lie inside the trip threshold",
                ));
            }
        }
        Ok(())
    }
}
