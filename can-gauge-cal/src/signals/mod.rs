//! Signal definitions from message databases
//!
//! Only DBC files are supported. The database is consulted once to find
//! where each gauge signal lives; nothing else in it is used.

pub mod dbc;

pub use dbc::{find_signals, load_signals, parse_dbc_file};
