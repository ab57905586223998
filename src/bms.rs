//! Core controller for LFP-BMS
//!
//! `BmsController` owns every estimator and engine and is the only writer
//! of their state. A single scheduling loop drives three ticks:
//!
//! - aggregate: read sensors, run protection and balancing, drive the
//!   actuators, publish a snapshot
//! - SOC: integrate current and run recalibration
//! - SOH: feed the latest SOC into cycle counting
//!
//! Operator commands arrive over a channel and are applied between ticks.

use crate::actuators::{ActuatorCommand, ActuatorSink};
use crate::balancing::BalancingController;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::logging::get_logger;
use crate::persistence::SohStore;
use crate::protection::ProtectionEngine;
use crate::sensors::{PackMeasurement, SensorSource};
use crate::soc::SocEstimator;
use crate::soh::SohEstimator;
use crate::status::StatusSnapshot;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior, interval};

mod commands;
mod snapshot;

/// Commands accepted from the console and the web API
#[derive(Debug, Clone, PartialEq)]
pub enum BmsCommand {
    ResetSoc(f64),
    ResetSoh,
    ResetCycles,
    CalibrateCapacity(f64),
    ClearProtection,
    StopBalancing,
}

pub struct BmsController {
    config: Config,
    clock: Arc<dyn Clock>,

    sensors: Box<dyn SensorSource>,
    actuators: Box<dyn ActuatorSink>,

    soc: SocEstimator,
    soh: SohEstimator,
    protection: ProtectionEngine,
    balancing: BalancingController,

    /// Latest measurement, `None` until the first successful read
    measurement: Option<PackMeasurement>,

    snapshot_tx: watch::Sender<Arc<StatusSnapshot>>,
    sequence: u64,

    logger: crate::logging::StructuredLogger,
}

impl BmsController {
    /// Build the controller and load persisted SOH state
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        sensors: Box<dyn SensorSource>,
        actuators: Box<dyn ActuatorSink>,
        store: Box<dyn SohStore>,
    ) -> Self {
        let capacity = config.pack.nominal_capacity_ah;
        let soc = SocEstimator::new(capacity, config.soc.clone(), clock.clone());
        let mut soh = SohEstimator::new(capacity, config.soh.clone(), store, clock.clone());
        soh.begin();
        let protection = ProtectionEngine::new(config.protection.clone(), clock.clone());
        let balancing = BalancingController::new(config.balancing.clone(), clock.clone());

        let (snapshot_tx, _) = watch::channel(Arc::new(StatusSnapshot::initial()));

        let logger = get_logger("bms");
        logger.info(&format!(
            "Controller ready: {:.1} Ah pack, SOH {:.1}%",
            capacity,
            soh.soh()
        ));

        Self {
            config,
            clock,
            sensors,
            actuators,
            soc,
            soh,
            protection,
            balancing,
            measurement: None,
            snapshot_tx,
            sequence: 0,
            logger,
        }
    }

    /// Sensors, protection, balancing, actuators, then publish.
    ///
    /// On a failed sensor read nothing else runs and the previous snapshot
    /// stays published.
    pub fn aggregate_tick(&mut self) -> Result<()> {
        let readings = match self.sensors.read() {
            Ok(r) => r,
            Err(e) => {
                self.logger
                    .error(&format!("Sensor read failed, skipping tick: {}", e));
                return Err(e);
            }
        };
        let m = PackMeasurement::from_readings(&readings);
        self.measurement = Some(m);

        if !self.soc.is_initialized() {
            self.soc.initialize_from_voltage(m.pack_voltage);
        }

        self.protection.update(&m.cells, m.current, m.temperature);
        self.balancing.update(&m.cells, m.current);

        self.drive_actuators();
        self.publish();
        Ok(())
    }

    /// Push the current protection enables and bleed target to the outputs
    fn drive_actuators(&mut self) {
        let command = ActuatorCommand {
            charge_enable: self.protection.charge_enabled(),
            discharge_enable: self.protection.discharge_enabled(),
            bleed_cell: self.balancing.bleeding_cell(),
        };
        self.actuators.apply(&command);
    }

    /// Coulomb counting plus recalibration on the latest measurement
    pub fn soc_tick(&mut self) {
        let Some(m) = self.measurement else {
            return;
        };
        if !self.soc.is_initialized() {
            return;
        }
        self.soc.update(m.current, m.temperature);
        self.soc.recalibrate(m.pack_voltage, m.current);
    }

    /// Cycle counting from the current SOC
    pub fn soh_tick(&mut self) {
        let Some(m) = self.measurement else {
            return;
        };
        if !self.soc.is_initialized() {
            return;
        }
        self.soh.update(self.soc.soc(), m.temperature);
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn soc(&self) -> &SocEstimator {
        &self.soc
    }

    pub fn soh(&self) -> &SohEstimator {
        &self.soh
    }

    pub fn protection(&self) -> &ProtectionEngine {
        &self.protection
    }

    pub fn balancing(&self) -> &BalancingController {
        &self.balancing
    }

    pub fn measurement(&self) -> Option<PackMeasurement> {
        self.measurement
    }

    /// Drive the three ticks and the command channel until `shutdown`
    /// turns true or its sender goes away. SOH is saved on the way out.
    pub async fn run(
        &mut self,
        mut commands_rx: mpsc::UnboundedReceiver<BmsCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let schedule = self.config.schedule.clone();
        let mut aggregate = interval(Duration::from_millis(schedule.aggregate_interval_ms));
        let mut soc = interval(Duration::from_millis(schedule.soc_interval_ms));
        let mut soh = interval(Duration::from_millis(schedule.soh_interval_ms));
        for tick in [&mut aggregate, &mut soc, &mut soh] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        self.logger.info(&format!(
            "Scheduler running: aggregate {} ms, SOC {} ms, SOH {} ms",
            schedule.aggregate_interval_ms, schedule.soc_interval_ms, schedule.soh_interval_ms
        ));

        loop {
            tokio::select! {
                _ = aggregate.tick() => {
                    // errors are already logged; the loop keeps going
                    let _ = self.aggregate_tick();
                }
                _ = soc.tick() => self.soc_tick(),
                _ = soh.tick() => self.soh_tick(),
                Some(cmd) = commands_rx.recv() => {
                    if let Err(e) = self.handle_command(cmd) {
                        self.logger.warn(&format!("Command rejected: {}", e));
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.logger.info("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.soh.save();
        self.logger.info("Controller stopped, SOH state saved");
        Ok(())
    }
}
