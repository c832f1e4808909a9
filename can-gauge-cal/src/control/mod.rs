//! Control frames
//!
//! The gauge interface stores its calibration in EEPROM and exposes it
//! through two families of extended-ID control frames:
//! - Signal Control (`0x1272100 | index`): where to find one signal in the
//!   vehicle's CAN traffic
//! - Table Control (`0x1272000 | sig << 5 | row`): one row of a signal's
//!   calibration table
//!
//! Writing a data frame of either family stores it; a remote request with the
//! same identifier asks the device to reply with what it has stored.

pub mod signal;
pub mod table;

pub use signal::SignalDef;
pub use table::Row;

use crate::types::{Frame, Result};

/// Family mask shared by both control frame families
pub const CTRL_MASK: u32 = 0x1FF_FF00;

/// A value that is written to the device and read back in a control frame
///
/// Implementations are the unit of work for
/// [`write_verify`](crate::verify::write_verify).
pub trait ControlFrame: Sized {
    /// Encode the write command
    fn marshal(&self) -> Result<Frame>;

    /// Remote request asking the device for its stored copy
    fn remote_request(&self) -> Result<Frame>;

    /// Decode a reply; fails with `WrongFamily` for frames of another family
    fn unmarshal(frame: &Frame) -> Result<Self>;

    /// True if `reply` answers this command rather than some other exchange
    fn matches_reply(&self, reply: &Self) -> bool;

    /// Compare the fields carried on the wire
    fn verify(&self, reply: &Self) -> bool;

    /// Human readable target used in logs and errors, e.g. "signal 2"
    fn describe(&self) -> String;
}
