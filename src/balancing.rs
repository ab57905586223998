//! Passive cell balancing
//!
//! One cell bleeds at a time, alternating fixed ON and OFF phases. The
//! target is re-picked at the start of every ON phase. Balancing runs only
//! while the pack is idle, with a start/stop hysteresis on the cell spread.

use crate::clock::Clock;
use crate::config::BalancingConfig;
use crate::logging::{StructuredLogger, get_logger};
use crate::sensors::{CELL_COUNT, CellVoltages, highest_cell_index};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePhase {
    On,
    Off,
}

pub struct BalancingController {
    config: BalancingConfig,
    clock: Arc<dyn Clock>,
    active: bool,
    phase: BalancePhase,
    phase_started_ms: u64,
    /// 1-based target cell, only meaningful while active
    target: u8,
    logger: StructuredLogger,
}

impl BalancingController {
    pub fn new(config: BalancingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            active: false,
            phase: BalancePhase::Off,
            phase_started_ms: 0,
            target: 0,
            logger: get_logger("balancing"),
        }
    }

    pub fn update(&mut self, cells: &CellVoltages, current_a: f64) {
        let now = self.clock.now_ms();

        let idle = current_a.abs() < self.config.idle_current_a;
        let max_idx = highest_cell_index(cells);
        let vmax = cells[max_idx];
        let vmin = cells.iter().copied().fold(f64::INFINITY, f64::min);
        let delta = vmax - vmin;

        if !self.active {
            let start =
                idle && vmax >= self.config.min_cell_v && delta >= self.config.start_delta_v;
            if start {
                self.active = true;
                self.target = max_idx as u8 + 1;
                self.enter_phase(BalancePhase::On, now);
                self.logger.info(&format!(
                    "Balancing started: cell {} ({:.3} V vs {:.3} V = {:.3} V)",
                    self.target, vmax, vmin, delta
                ));
            }
            return;
        }

        if !idle || delta <= self.config.stop_delta_v {
            self.deactivate();
            self.logger.info(&format!(
                "Balancing stopped ({})",
                if idle { "spread within band" } else { "pack not idle" }
            ));
            return;
        }

        let elapsed = now.saturating_sub(self.phase_started_ms);
        match self.phase {
            BalancePhase::On if elapsed >= self.config.on_ms => {
                self.enter_phase(BalancePhase::Off, now);
            }
            BalancePhase::Off if elapsed >= self.config.off_ms => {
                let next = max_idx as u8 + 1;
                if next != self.target {
                    self.logger
                        .debug(&format!("Balancing retarget: cell {} -> {}", self.target, next));
                }
                self.target = next;
                self.enter_phase(BalancePhase::On, now);
            }
            _ => {}
        }
    }

    fn enter_phase(&mut self, phase: BalancePhase, now: u64) {
        self.phase = phase;
        self.phase_started_ms = now;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.phase = BalancePhase::Off;
        self.phase_started_ms = 0;
        self.target = 0;
    }

    /// Manual stop, regardless of spread
    pub fn stop(&mut self) {
        self.deactivate();
        self.logger.info("Balancing manually stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> Option<BalancePhase> {
        self.active.then_some(self.phase)
    }

    /// 1-based cell chosen for this balancing run
    pub fn target_cell(&self) -> Option<u8> {
        self.active.then_some(self.target)
    }

    /// 1-based cell whose bleed path is energized right now
    pub fn bleeding_cell(&self) -> Option<u8> {
        (self.active && self.phase == BalancePhase::On).then_some(self.target)
    }

    pub fn is_balancing(&self, cell: u8) -> bool {
        self.bleeding_cell() == Some(cell)
    }

    /// Bleed outputs, index 0 is cell 1. At most one is set.
    pub fn bleed_outputs(&self) -> [bool; CELL_COUNT] {
        let mut out = [false; CELL_COUNT];
        if let Some(cell) = self.bleeding_cell()
            && let Some(slot) = out.get_mut(usize::from(cell).wrapping_sub(1))
        {
            *slot = true;
        }
        out
    }

    /// Time left in the current phase
    pub fn phase_remaining_ms(&self) -> Option<u64> {
        let phase = self.phase()?;
        let len = match phase {
            BalancePhase::On => self.config.on_ms,
            BalancePhase::Off => self.config.off_ms,
        };
        let elapsed = self.clock.now_ms().saturating_sub(self.phase_started_ms);
        Some(len.saturating_sub(elapsed))
    }
}
