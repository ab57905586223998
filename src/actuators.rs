//! Actuator output contract
//!
//! MOSFET enables and the bleed selection are level signals, re-asserted on
//! every aggregation tick.

use crate::logging::{StructuredLogger, get_logger};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActuatorCommand {
    pub charge_enable: bool,
    pub discharge_enable: bool,
    /// 1-based cell to bleed, `None` for all bleed paths off
    pub bleed_cell: Option<u8>,
}

impl Default for ActuatorCommand {
    fn default() -> Self {
        Self {
            charge_enable: true,
            discharge_enable: true,
            bleed_cell: None,
        }
    }
}

/// Consumer of actuator commands (MOSFET and bleed drivers)
pub trait ActuatorSink: Send {
    fn apply(&mut self, command: &ActuatorCommand);
}

/// Sink for hosts without hardware outputs: remembers the last command and
/// logs whenever it changes
pub struct LoggingActuators {
    last: Option<ActuatorCommand>,
    applied: u64,
    logger: StructuredLogger,
}

impl LoggingActuators {
    pub fn new() -> Self {
        Self {
            last: None,
            applied: 0,
            logger: get_logger("actuators"),
        }
    }

    pub fn last(&self) -> Option<ActuatorCommand> {
        self.last
    }

    pub fn applied_count(&self) -> u64 {
        self.applied
    }
}

impl Default for LoggingActuators {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorSink for LoggingActuators {
    fn apply(&mut self, command: &ActuatorCommand) {
        self.applied += 1;
        if self.last.as_ref() != Some(command) {
            self.logger.info(&format!(
                "Outputs: CHG={} DSG={} BAL={}",
                if command.charge_enable { "ON" } else { "OFF" },
                if command.discharge_enable { "ON" } else { "OFF" },
                command
                    .bleed_cell
                    .map_or_else(|| "none".to_string(), |c| format!("cell {}", c)),
            ));
        }
        self.last = Some(*command);
    }
}
