//! Sensor input contract
//!
//! The sensor driver hands over calibrated readings; no unit conversion
//! or plausibility filtering happens past this point.

use crate::config::SimulatedSensorConfig;
use crate::error::{BmsError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub const CELL_COUNT: usize = 4;

/// Per-cell voltages, index 0 is cell 1
pub type CellVoltages = [f64; CELL_COUNT];

/// Raw per-tick input from the sensor driver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    pub cells: CellVoltages,
    /// Signed pack current, positive while charging (A)
    pub current: f64,
    /// Pack temperature (°C)
    pub temperature: f64,
}

/// Zero-based index of the highest cell; the first index wins ties
pub fn highest_cell_index(cells: &CellVoltages) -> usize {
    let mut idx = 0;
    for (i, &v) in cells.iter().enumerate().skip(1) {
        if v > cells[idx] {
            idx = i;
        }
    }
    idx
}

/// Readings plus the pack-level values derived once per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PackMeasurement {
    pub cells: CellVoltages,
    pub pack_voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub min_cell: f64,
    pub max_cell: f64,
    pub cell_delta: f64,
    pub average_cell: f64,
}

impl PackMeasurement {
    pub fn from_readings(readings: &SensorReadings) -> Self {
        let cells = readings.cells;
        let pack_voltage: f64 = cells.iter().sum();
        let min_cell = cells.iter().copied().fold(f64::INFINITY, f64::min);
        let max_cell = cells[highest_cell_index(&cells)];
        Self {
            cells,
            pack_voltage,
            current: readings.current,
            temperature: readings.temperature,
            min_cell,
            max_cell,
            cell_delta: max_cell - min_cell,
            average_cell: pack_voltage / CELL_COUNT as f64,
        }
    }

    /// 1-indexed cell accessor
    pub fn cell(&self, n: usize) -> Option<f64> {
        n.checked_sub(1).and_then(|i| self.cells.get(i).copied())
    }

    /// 1-indexed highest cell
    pub fn highest_cell(&self) -> u8 {
        highest_cell_index(&self.cells) as u8 + 1
    }
}

impl Default for PackMeasurement {
    fn default() -> Self {
        Self::from_readings(&SensorReadings {
            cells: [0.0; CELL_COUNT],
            current: 0.0,
            temperature: 0.0,
        })
    }
}

/// Source of calibrated readings, polled once per aggregation tick
pub trait SensorSource: Send {
    fn read(&mut self) -> Result<SensorReadings>;
}

#[derive(Debug)]
struct SimulatedState {
    readings: SensorReadings,
    failure: Option<String>,
}

/// Sensor source serving readings set by the caller. Clones share state,
/// so a handle kept outside the controller can steer the pack.
#[derive(Debug, Clone)]
pub struct SimulatedPack {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedPack {
    pub fn new(readings: SensorReadings) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                readings,
                failure: None,
            })),
        }
    }

    pub fn from_config(config: &SimulatedSensorConfig) -> Self {
        Self::new(SensorReadings {
            cells: config.cell_voltages,
            current: config.current_a,
            temperature: config.temperature_c,
        })
    }

    fn with_state<F: FnOnce(&mut SimulatedState)>(&self, f: F) {
        if let Ok(mut guard) = self.state.lock() {
            f(&mut guard);
        }
    }

    pub fn set_readings(&self, readings: SensorReadings) {
        self.with_state(|s| s.readings = readings);
    }

    pub fn set_cells(&self, cells: CellVoltages) {
        self.with_state(|s| s.readings.cells = cells);
    }

    pub fn set_current(&self, current: f64) {
        self.with_state(|s| s.readings.current = current);
    }

    pub fn set_temperature(&self, temperature: f64) {
        self.with_state(|s| s.readings.temperature = temperature);
    }

    /// Make subsequent reads fail until cleared with `None`
    pub fn set_failure(&self, failure: Option<&str>) {
        self.with_state(|s| s.failure = failure.map(str::to_string));
    }
}

impl SensorSource for SimulatedPack {
    fn read(&mut self) -> Result<SensorReadings> {
        let guard = self
            .state
            .lock()
            .map_err(|_| BmsError::sensor("simulated pack lock poisoned"))?;
        if let Some(msg) = &guard.failure {
            return Err(BmsError::sensor(msg.clone()));
        }
        Ok(guard.readings)
    }
}
