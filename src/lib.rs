//! # LFP-BMS - 4S LiFePO4 battery management
//!
//! Estimation and protection logic for a four-cell LiFePO4 pack, with a
//! host-side runtime that serves the live status over HTTP and a command
//! console.
//!
//! ## Features
//!
//! - **SOC**: coulomb counting with temperature-compensated capacity, OCV
//!   seeding and rest-period recalibration
//! - **SOH**: equivalent-full-cycle counting, linear fade model, persisted
//!   counters
//! - **Protection**: six trip/release channels with debounced recovery,
//!   driving the charge and discharge MOSFETs
//! - **Balancing**: single-cell duty-cycled bleed with spread hysteresis
//! - **Web Interface**: JSON status, dashboard document, SSE stream
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `clock`: injectable monotonic millisecond time source
//! - `table`: shared piecewise-linear lookup tables
//! - `soc`, `soh`: estimators
//! - `protection`, `balancing`: control state machines
//! - `sensors`, `actuators`: collaborator contracts
//! - `persistence`: SOH state storage
//! - `status`: published snapshot and dashboard rendering
//! - `bms`: controller and scheduling loop
//! - `console`, `web`: operator interfaces
//! - `config`, `logging`, `error`: ambient plumbing

pub mod actuators;
pub mod balancing;
pub mod bms;
pub mod clock;
pub mod config;
#[cfg(feature = "console")]
pub mod console;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod protection;
pub mod sensors;
pub mod soc;
pub mod soh;
pub mod status;
pub mod table;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use bms::{BmsCommand, BmsController};
pub use config::Config;
pub use error::{BmsError, Result};
pub use status::StatusSnapshot;
