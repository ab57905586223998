use super::{BmsCommand, BmsController};
use crate::error::{BmsError, Result};

impl BmsController {
    /// Apply an operator command and republish the snapshot. Overrides that
    /// change an output reach the actuators before the next tick.
    pub fn handle_command(&mut self, cmd: BmsCommand) -> Result<()> {
        self.logger.info(&format!("Command: {:?}", cmd));
        match cmd {
            BmsCommand::ResetSoc(soc) => {
                if !soc.is_finite() {
                    return Err(BmsError::validation("soc", "Must be a finite number"));
                }
                self.soc.reset(soc);
            }
            BmsCommand::ResetSoh => self.soh.reset_soh(),
            BmsCommand::ResetCycles => self.soh.reset_cycles(),
            BmsCommand::CalibrateCapacity(ah) => self.soh.calibrate_from_capacity(ah)?,
            BmsCommand::ClearProtection => {
                let active = self.protection.active_faults();
                if active.is_empty() {
                    self.logger.info("No protection to clear");
                } else {
                    self.logger.warn(&format!(
                        "Manually clearing protection: {}",
                        active
                            .iter()
                            .map(|c| c.label())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
                self.protection.clear_all();
                self.drive_actuators();
            }
            BmsCommand::StopBalancing => {
                self.balancing.stop();
                self.drive_actuators();
            }
        }
        self.publish();
        Ok(())
    }
}
