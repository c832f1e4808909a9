//! CAN Gauge Interface Calibration Library
//!
//! Programs the calibration data of a CAN gauge interface (signal layouts and
//! lookup tables) into its EEPROM over a CAN bus, confirming every write by
//! reading it back.
//!
//! # Architecture
//!
//! - [`Bus`] owns the CAN device and two worker threads that serialize
//!   transmission and stream received frames
//! - [`control`] encodes and decodes the Signal Control and Table Control
//!   frames understood by the device
//! - [`write_verify`] writes one control frame, requests it back and compares,
//!   retrying a bounded number of times
//! - [`Table`] collects a signal's calibration rows in key order
//!
//! Reading DBC and table files is provided for convenience in [`signals`]
//! and [`tables`]; the command line front end lives in `can-gauge-cli`.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_gauge_cal::{load_signals, parse_table, Bus, ProtocolConfig};
//! use std::path::Path;
//!
//! let config = ProtocolConfig::new();
//! let bus = Bus::connect("can0", &config).unwrap();
//!
//! let sigs = load_signals(Path::new("vehicle.dbc"), &[(0, "EngineSpeed")]).unwrap();
//! for sig in &sigs {
//!     sig.send_encoding(&bus, &config).unwrap();
//! }
//!
//! let table = parse_table(Path::new("tach.csv"), 0).unwrap();
//! table.send(&bus, &config).unwrap();
//!
//! bus.close();
//! ```

// Public modules
pub mod bus;
pub mod config;
pub mod control;
pub mod signals;
pub mod tables;
pub mod types;
pub mod verify;

// Re-export main types for convenience
pub use bus::{Bus, CanInterface, FrameBus};
pub use config::ProtocolConfig;
pub use control::{ControlFrame, Row, SignalDef};
pub use signals::load_signals;
pub use tables::{parse_table, parse_table_str, Table, MAX_TAB_ROWS};
pub use types::{CalError, Frame, Result};
pub use verify::write_verify;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

