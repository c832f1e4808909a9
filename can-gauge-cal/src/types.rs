//! Core types for the calibration library
//!
//! This module defines the on-wire CAN frame shared by every layer and the
//! error type all operations report through.

use std::fmt;

/// Result type for calibration operations
pub type Result<T> = std::result::Result<T, CalError>;

/// Mask for a standard (11-bit) CAN identifier
pub const STD_MASK: u32 = 0x7FF;

/// Mask for an extended (29-bit) CAN identifier
pub const EXT_MASK: u32 = 0x1FFF_FFFF;

/// Maximum payload length of a classic CAN frame
pub const MAX_DLC: usize = 8;

/// A classic CAN frame as exchanged with the physical interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    /// CAN identifier (11-bit or 29-bit)
    pub id: u32,
    /// True if `id` is an extended (29-bit) identifier
    pub extended: bool,
    /// True if this is a remote request frame
    pub remote: bool,
    /// Data length code, 0..=8
    pub len: u8,
    /// Payload bytes; only the first `len` are meaningful
    pub data: [u8; MAX_DLC],
}

impl Frame {
    /// Build a data frame carrying `payload`
    pub fn data_frame(id: u32, extended: bool, payload: &[u8]) -> Result<Self> {
        check_id(id, extended)?;
        if payload.len() > MAX_DLC {
            return Err(CalError::OutOfRange(format!(
                "payload of {} bytes exceeds {} bytes",
                payload.len(),
                MAX_DLC
            )));
        }

        let mut data = [0u8; MAX_DLC];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            extended,
            remote: false,
            len: payload.len() as u8,
            data,
        })
    }

    /// Build a remote request frame with zero payload
    pub fn remote(id: u32, extended: bool) -> Result<Self> {
        check_id(id, extended)?;
        Ok(Self {
            id,
            extended,
            remote: true,
            len: 0,
            data: [0u8; MAX_DLC],
        })
    }

    /// The meaningful payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(MAX_DLC)]
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "{:08X}", self.id)?;
        } else {
            write!(f, "{:03X}", self.id)?;
        }
        if self.remote {
            return write!(f, "#R");
        }
        write!(f, "#")?;
        for byte in self.payload() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

fn check_id(id: u32, extended: bool) -> Result<()> {
    let mask = if extended { EXT_MASK } else { STD_MASK };
    if id & !mask != 0 {
        return Err(CalError::OutOfRange(format!(
            "CAN ID 0x{:X} does not fit in {} bits",
            id,
            if extended { 29 } else { 11 }
        )));
    }
    Ok(())
}

/// Errors that can occur while calibrating the device
#[derive(Debug, thiserror::Error)]
pub enum CalError {
    #[error("Failed to open CAN device {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Timed out waiting to {0}")]
    Timeout(&'static str),

    #[error("Bus operation cancelled")]
    Cancelled,

    #[error("Bus is closed")]
    BusClosed,

    #[error("Frame {id:X} is not a {family} frame")]
    WrongFamily { family: &'static str, id: u32 },

    #[error("{family} frame has wrong DLC: {len}")]
    WrongLength { family: &'static str, len: u8 },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Table {sig_index}: too many rows (max {max})")]
    TableFull { sig_index: u8, max: usize },

    #[error("Duplicate key {0}")]
    DuplicateKey(i32),

    #[error("Table {0} has no rows")]
    EmptyTable(u8),

    #[error("{0} verification failed")]
    VerifyFailed(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Duplicate signal: {0}")]
    DuplicateSignal(String),

    #[error("Failed to parse table: {0}")]
    TableParseError(String),
}

impl CalError {
    /// True for replies that belong to a different frame family and should
    /// simply be ignored by the caller
    pub fn is_wrong_family(&self) -> bool {
        matches!(self, CalError::WrongFamily { .. })
    }
}
