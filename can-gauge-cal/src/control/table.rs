//! Table Control frames
//!
//! Identifier: `0x1272000 | (sig_index << 5) | row_index`, which gives 8 signal
//! slots of 32 rows each. Payload (6 bytes, big-endian): `i32` key then `u16`
//! value.

use super::{ControlFrame, CTRL_MASK};
use crate::types::{CalError, Frame, Result};
use byteorder::{BigEndian, ByteOrder};

/// Table Control identifier base
pub const TBL_CTRL_ID: u32 = 0x127_2000;

/// Payload length of a Table Control data frame
pub const TBL_CTRL_DLC: u8 = 6;

/// Highest signal index addressable by a Table Control identifier
pub const MAX_TABLE_SIG_INDEX: u8 = 0x7;

/// Highest row index addressable by a Table Control identifier
pub const MAX_ROW_INDEX: u8 = 0x1F;

const FAMILY: &str = "Table Control";

/// One row of a signal's calibration table as stored on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub sig_index: u8,
    pub row_index: u8,
    pub key: i32,
    pub val: u16,
}

impl Row {
    pub fn new(sig_index: u8, row_index: u8, key: i32, val: u16) -> Self {
        Self {
            sig_index,
            row_index,
            key,
            val,
        }
    }

    fn ctrl_id(&self) -> Result<u32> {
        if self.sig_index > MAX_TABLE_SIG_INDEX {
            return Err(CalError::OutOfRange(format!(
                "table signal index out of range: {}",
                self.sig_index
            )));
        }
        if self.row_index > MAX_ROW_INDEX {
            return Err(CalError::OutOfRange(format!(
                "table row index out of range: {}",
                self.row_index
            )));
        }
        Ok(TBL_CTRL_ID | (u32::from(self.sig_index) << 5) | u32::from(self.row_index))
    }
}

impl ControlFrame for Row {
    fn marshal(&self) -> Result<Frame> {
        let id = self.ctrl_id()?;
        let mut data = [0u8; TBL_CTRL_DLC as usize];
        BigEndian::write_i32(&mut data[0..4], self.key);
        BigEndian::write_u16(&mut data[4..6], self.val);
        Frame::data_frame(id, true, &data)
    }

    fn remote_request(&self) -> Result<Frame> {
        Frame::remote(self.ctrl_id()?, true)
    }

    fn unmarshal(frame: &Frame) -> Result<Self> {
        if !frame.extended || frame.remote || frame.id & CTRL_MASK != TBL_CTRL_ID {
            return Err(CalError::WrongFamily {
                family: FAMILY,
                id: frame.id,
            });
        }
        if frame.len != TBL_CTRL_DLC {
            return Err(CalError::WrongLength {
                family: FAMILY,
                len: frame.len,
            });
        }

        let data = frame.payload();
        Ok(Self {
            sig_index: ((frame.id >> 5) & 0x7) as u8,
            row_index: (frame.id & 0x1F) as u8,
            key: BigEndian::read_i32(&data[0..4]),
            val: BigEndian::read_u16(&data[4..6]),
        })
    }

    fn matches_reply(&self, reply: &Self) -> bool {
        reply.sig_index == self.sig_index && reply.row_index == self.row_index
    }

    fn verify(&self, reply: &Self) -> bool {
        reply == self
    }

    fn describe(&self) -> String {
        format!("table {} row {}", self.sig_index, self.row_index)
    }
}
