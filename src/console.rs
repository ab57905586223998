//! Line-oriented command console
//!
//! Reads commands from any async line source (stdin in the binary),
//! answers informational commands from the latest snapshot and forwards
//! mutating ones to the controller.

use crate::bms::BmsCommand;
use crate::error::{BmsError, Result};
use crate::logging::get_logger;
use crate::status::{StatusSnapshot, dashboard_json};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// Largest capacity accepted by `cal_soh` (Ah)
pub const MAX_CALIBRATION_AH: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Soc,
    Soh,
    Sensors,
    Json,
    Status,
    Protection,
    Balance,
    /// Forwarded to the controller
    Control(BmsCommand),
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim().to_lowercase();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    let cmd = match name {
        "help" => ConsoleCommand::Help,
        "soc" => ConsoleCommand::Soc,
        "soh" => ConsoleCommand::Soh,
        "sensors" => ConsoleCommand::Sensors,
        "json" => ConsoleCommand::Json,
        "status" => ConsoleCommand::Status,
        "protection" => ConsoleCommand::Protection,
        "balance" => ConsoleCommand::Balance,
        "reset_soh" => ConsoleCommand::Control(BmsCommand::ResetSoh),
        "reset_cycles" => ConsoleCommand::Control(BmsCommand::ResetCycles),
        "clear" => ConsoleCommand::Control(BmsCommand::ClearProtection),
        "stop_balance" => ConsoleCommand::Control(BmsCommand::StopBalancing),
        "cal_soh" => {
            let ah = parse_number("capacity_ah", arg)?;
            if !(ah > 0.0 && ah <= MAX_CALIBRATION_AH) {
                return Err(BmsError::validation(
                    "capacity_ah",
                    format!("Invalid capacity (0-{}Ah)", MAX_CALIBRATION_AH),
                ));
            }
            ConsoleCommand::Control(BmsCommand::CalibrateCapacity(ah))
        }
        "set_soc" => {
            let soc = parse_number("soc", arg)?;
            ConsoleCommand::Control(BmsCommand::ResetSoc(soc))
        }
        other => {
            return Err(BmsError::validation(
                "command",
                format!("Unknown command '{}'. Type 'help' for list", other),
            ));
        }
    };
    Ok(Some(cmd))
}

fn parse_number(field: &str, arg: Option<&str>) -> Result<f64> {
    let raw = arg.ok_or_else(|| BmsError::validation(field, "Missing value"))?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(BmsError::validation(
            field,
            format!("'{}' is not a number", raw),
        )),
    }
}

const HELP: &str = "\
COMMANDS
 monitoring:
  soc            SOC diagnostics
  soh            SOH and cycle counters
  sensors        Cell voltages, current, temperature
  json           Dashboard JSON
  status         One-line summary
  protection     Protection channels and MOSFETs
  balance        Balancing state
 calibration:
  reset_soh      Reset SOH to 100%
  reset_cycles   Reset cycle counters
  cal_soh <Ah>   Calibrate SOH from measured capacity
  set_soc <pct>  Force SOC
 system:
  clear          Clear protection (use with caution)
  stop_balance   Stop balancing
  help           Show this menu
";

fn on_off(v: bool) -> &'static str {
    if v { "ON" } else { "OFF" }
}

fn ok_alarm(v: bool) -> &'static str {
    if v { "ALARM" } else { "OK" }
}

/// Text for an informational command, or the confirmation for a control
/// command about to be forwarded
pub fn render(cmd: &ConsoleCommand, s: &StatusSnapshot) -> String {
    let mut out = String::new();
    match cmd {
        ConsoleCommand::Help => out.push_str(HELP),
        ConsoleCommand::Soc => {
            let soc = &s.soc;
            let error = (soc.soc - soc.ocv_soc).abs();
            let _ = writeln!(
                out,
                "SOC: {:.1}% | OCV: {:.1}% (delta {:.1}%)",
                soc.soc, soc.ocv_soc, error
            );
            let _ = writeln!(
                out,
                "{:.1}/{:.0} mAh | {:.1} °C (factor {:.2})",
                soc.coulomb_counter_mah,
                soc.capacity_mah,
                s.measurement.temperature,
                soc.temperature_factor
            );
            let _ = writeln!(
                out,
                "{} | {:+.2} A",
                if soc.idle { "IDLE" } else { "ACTIVE" },
                s.measurement.current
            );
            if error > 10.0 {
                let _ = writeln!(out, "Large error - check calibration");
            }
        }
        ConsoleCommand::Soh => {
            let soh = &s.soh;
            let _ = writeln!(out, "SOH: {:.1}%", soh.soh);
            let _ = writeln!(out, "Capacity: {:.2} Ah", soh.remaining_capacity_ah);
            let _ = writeln!(
                out,
                "Cycles: {:.1} (equivalent {:.2}), remaining {:.0}",
                soh.total_cycles, soh.equivalent_full_cycles, soh.remaining_cycles
            );
            if soh.end_of_life {
                let _ = writeln!(out, "Battery approaching end of life");
            }
        }
        ConsoleCommand::Sensors => {
            let m = &s.measurement;
            for (i, v) in m.cells.iter().enumerate() {
                let _ = writeln!(out, "Cell {}: {:.3} V", i + 1, v);
            }
            let _ = writeln!(
                out,
                "Pack: {:.2} V | {:+.2} A | {:.1} °C",
                m.pack_voltage, m.current, m.temperature
            );
        }
        ConsoleCommand::Json => {
            out.push_str(&dashboard_json(s).to_string());
            out.push('\n');
        }
        ConsoleCommand::Status => {
            let _ = writeln!(
                out,
                "{:.2} V {:+.2} A {:.1} °C | SOC {:.1}% | SOH {:.1}% | {} | CHG {} DSG {} | BAL {}",
                s.measurement.pack_voltage,
                s.measurement.current,
                s.measurement.temperature,
                s.soc.soc,
                s.soh.soh,
                s.charge_state.as_str(),
                on_off(s.protection.charge_enable),
                on_off(s.protection.discharge_enable),
                s.balancing
                    .target_cell
                    .map_or_else(|| "-".to_string(), |c| format!("cell {}", c)),
            );
        }
        ConsoleCommand::Protection => {
            let p = &s.protection;
            let _ = writeln!(out, "CHG MOSFET: {}", on_off(p.charge_enable));
            let _ = writeln!(out, "DSG MOSFET: {}", on_off(p.discharge_enable));
            let _ = writeln!(out, "Charging protection:");
            let _ = writeln!(out, "  over voltage: {}", ok_alarm(p.charge_overvoltage));
            let _ = writeln!(out, "  over current: {}", ok_alarm(p.charge_overcurrent));
            let _ = writeln!(out, "  temperature:  {}", ok_alarm(p.charge_temperature));
            let _ = writeln!(out, "Discharging protection:");
            let _ = writeln!(out, "  under voltage: {}", ok_alarm(p.discharge_undervoltage));
            let _ = writeln!(out, "  over current:  {}", ok_alarm(p.discharge_overcurrent));
            let _ = writeln!(out, "  temperature:   {}", ok_alarm(p.discharge_temperature));
            let _ = writeln!(
                out,
                "Protection status: {}",
                if p.any_fault() { "TRIGGERED" } else { "NORMAL" }
            );
        }
        ConsoleCommand::Balance => {
            let b = &s.balancing;
            let _ = writeln!(out, "Active: {}", if b.active { "YES" } else { "NO" });
            if let Some(cell) = b.target_cell {
                let _ = writeln!(out, "Cell: {}", cell);
            }
            if let Some(ms) = b.phase_remaining_ms {
                let _ = writeln!(out, "Next switch: {:.1} s", ms as f64 / 1000.0);
            }
            let _ = writeln!(out, "Imbalance: {:.3} V", s.measurement.cell_delta);
        }
        ConsoleCommand::Control(c) => {
            let msg = match c {
                BmsCommand::ResetSoh => "SOH reset to 100%".to_string(),
                BmsCommand::ResetCycles => "Cycles reset".to_string(),
                BmsCommand::CalibrateCapacity(ah) => format!("Calibrating SOH from {:.2} Ah", ah),
                BmsCommand::ResetSoc(soc) => format!("SOC set to {:.1}%", soc.clamp(0.0, 100.0)),
                BmsCommand::ClearProtection if s.protection.any_fault() => {
                    "Protection cleared (use with caution!)".to_string()
                }
                BmsCommand::ClearProtection => "No protection to clear".to_string(),
                BmsCommand::StopBalancing => "Balancing stopped".to_string(),
            };
            out.push_str(&msg);
            out.push('\n');
        }
    }
    out
}

/// Handle one line: parse, forward controls, return the text to print
pub fn execute(
    line: &str,
    snapshot: &StatusSnapshot,
    commands_tx: &mpsc::UnboundedSender<BmsCommand>,
) -> Option<String> {
    match parse(line) {
        Ok(None) => None,
        Ok(Some(cmd)) => {
            if let ConsoleCommand::Control(c) = &cmd
                && commands_tx.send(c.clone()).is_err()
            {
                return Some("Controller is not running\n".to_string());
            }
            Some(render(&cmd, snapshot))
        }
        Err(e) => Some(format!("{}\n", e.user_message())),
    }
}

/// Serve console lines until the input ends or `shutdown` turns true
pub async fn run_console<R, W>(
    reader: R,
    mut writer: W,
    snapshot_rx: watch::Receiver<Arc<StatusSnapshot>>,
    commands_tx: mpsc::UnboundedSender<BmsCommand>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let logger = get_logger("console");
    logger.info("Console ready, type 'help' for commands");
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    logger.debug("Console input closed");
                    break;
                };
                let snapshot = snapshot_rx.borrow().clone();
                if let Some(text) = execute(&line, &snapshot, &commands_tx) {
                    writer.write_all(text.as_bytes()).await?;
                    writer.flush().await?;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}
