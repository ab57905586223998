use super::*;

impl Default for Config {
    fn default() -> Self {
        Self {
            pack: PackConfig::default(),
            soc: SocConfig::default(),
            soh: SohConfig::default(),
            protection: ProtectionConfig::default(),
            alarms: AlarmConfig::default(),
            balancing: BalancingConfig::default(),
            schedule: ScheduleConfig::default(),
            sensors: SimulatedSensorConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            nominal_capacity_ah: 6.0,
        }
    }
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            idle_current_a: 0.05,
            max_dt_s: 2.0,
            full_charge_arm_v: 14.5,
            recalibration_full_v: 14.4,
            full_charge_disarm_v: 13.2,
            full_dwell_ms: 30 * 60 * 1000,
            ocv_sync_dwell_ms: 2 * 60 * 60 * 1000,
            ocv_error_band: 5.0,
            ocv_blend_alpha: 0.85,
        }
    }
}

impl Default for SohConfig {
    fn default() -> Self {
        Self {
            aging_rate_per_cycle: 0.01,
            rated_cycles: 2000.0,
            end_of_life_soh: 80.0,
            save_interval_ms: 5 * 60 * 1000,
            state_file: "/data/lfp_bms_soh.json".to_string(),
            namespace: "soh_data".to_string(),
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            charge_ov_trip_v: 3.65,
            charge_ov_release_v: 3.40,
            charge_ov_recover_ms: 5000,

            charge_oc_trip_a: 1.4,
            charge_oc_release_a: 0.8,
            charge_oc_recover_ms: 5000,

            charge_temp_high_trip_c: 45.0,
            charge_temp_high_release_c: 38.0,
            charge_temp_low_trip_c: 0.0,
            charge_temp_low_release_c: 3.0,
            charge_temp_recover_ms: 5000,

            discharge_uv_trip_v: 2.50,
            discharge_uv_release_v: 2.90,
            discharge_uv_recover_ms: 5000,

            discharge_oc_trip_a: 6.0,
            discharge_oc_release_a: 3.5,
            discharge_oc_recover_ms: 5000,

            discharge_temp_high_trip_c: 60.0,
            discharge_temp_high_release_c: 50.0,
            discharge_temp_low_trip_c: -10.0,
            discharge_temp_low_release_c: -8.0,
            discharge_temp_recover_ms: 5000,
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            direction_deadband_a: 0.1,

            cell_ov_warning_v: 3.45,
            cell_ov_alarm_v: 3.65,
            cell_uv_warning_v: 3.00,
            cell_uv_alarm_v: 2.50,

            charge_current_warning_a: 1.4,
            charge_current_alarm_a: 2.0,
            discharge_current_warning_a: 4.0,
            discharge_current_alarm_a: 6.0,

            charge_temp_high_warning_c: 40.0,
            charge_temp_high_alarm_c: 45.0,
            charge_temp_low_warning_c: 5.0,
            charge_temp_low_alarm_c: 0.0,

            discharge_temp_high_warning_c: 55.0,
            discharge_temp_high_alarm_c: 60.0,
            discharge_temp_low_warning_c: -5.0,
            discharge_temp_low_alarm_c: -10.0,
        }
    }
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            idle_current_a: 0.1,
            start_delta_v: 0.10,
            stop_delta_v: 0.03,
            min_cell_v: 3.50,
            on_ms: 5000,
            off_ms: 5000,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            aggregate_interval_ms: 100,
            soc_interval_ms: 1000,
            soh_interval_ms: 10_000,
        }
    }
}

impl Default for SimulatedSensorConfig {
    fn default() -> Self {
        Self {
            cell_voltages: [3.30, 3.30, 3.30, 3.30],
            current_a: 0.0,
            temperature_c: 25.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/data/log/lfp-bms.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
