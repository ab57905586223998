use crate::status::{
    BalancingStatus, ChargeState, DisplayAlarms, ProtectionStatus, SocStatus, SohStatus,
    StatusSnapshot,
};
use chrono::Utc;
use std::sync::Arc;

impl super::BmsController {
    fn build_soc_status(&self) -> SocStatus {
        let Some(m) = self.measurement else {
            return SocStatus {
                initialized: self.soc.is_initialized(),
                soc: self.soc.soc(),
                capacity_mah: self.soc.capacity_mah(),
                coulomb_counter_mah: self.soc.coulomb_counter_mah(),
                ..Default::default()
            };
        };
        let diag = self.soc.diagnostics(m.pack_voltage, m.temperature);
        SocStatus {
            initialized: self.soc.is_initialized(),
            soc: diag.soc,
            ocv_soc: diag.ocv_soc,
            coulomb_counter_mah: diag.coulomb_counter_mah,
            capacity_mah: diag.capacity_mah,
            temperature_factor: diag.temperature_factor,
            idle: diag.idle,
        }
    }

    fn build_soh_status(&self) -> SohStatus {
        SohStatus {
            soh: self.soh.soh(),
            remaining_capacity_ah: self.soh.current_capacity_ah(),
            total_cycles: self.soh.total_cycles(),
            remaining_cycles: self.soh.remaining_cycles(),
            equivalent_full_cycles: self.soh.equivalent_full_cycles(),
            end_of_life: self.soh.end_of_life(),
        }
    }

    fn build_balancing_status(&self) -> BalancingStatus {
        BalancingStatus {
            active: self.balancing.is_active(),
            target_cell: self.balancing.target_cell(),
            bleeding_cells: self.balancing.bleeding_cell().into_iter().collect(),
            phase_remaining_ms: self.balancing.phase_remaining_ms(),
        }
    }

    /// Assemble a fresh snapshot from current component state
    pub fn build_snapshot(&self) -> StatusSnapshot {
        let m = self.measurement.unwrap_or_default();
        let charge_state =
            ChargeState::classify(m.current, self.config.alarms.direction_deadband_a);
        let alarms = if self.measurement.is_some() {
            DisplayAlarms::evaluate(&m, charge_state, &self.config.alarms)
        } else {
            DisplayAlarms::default()
        };

        StatusSnapshot {
            timestamp: Utc::now(),
            uptime_ms: self.clock.now_ms(),
            sequence: self.sequence,
            measurement: m,
            charge_state,
            soc: self.build_soc_status(),
            soh: self.build_soh_status(),
            alarms,
            protection: ProtectionStatus::from_engine(&self.protection),
            balancing: self.build_balancing_status(),
        }
    }

    /// Swap in a new snapshot for all subscribers
    pub(crate) fn publish(&mut self) {
        self.sequence += 1;
        let snapshot = Arc::new(self.build_snapshot());
        self.snapshot_tx.send_replace(snapshot);
    }
}
