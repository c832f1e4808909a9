//! Signal Control frames
//!
//! Payload layout (7 bytes, big-endian):
//!
//! | bytes | field                                             |
//! |-------|---------------------------------------------------|
//! | 0..4  | message ID, bit 31 set for extended IDs (EXIDE)   |
//! | 4     | start bit                                         |
//! | 5     | size in bits                                      |
//! | 6     | bit 7 = little-endian, bit 6 = signed             |

use super::{ControlFrame, CTRL_MASK};
use crate::bus::FrameBus;
use crate::config::ProtocolConfig;
use crate::types::{CalError, Frame, Result, EXT_MASK, STD_MASK};
use crate::verify::write_verify;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Signal Control identifier base; the low 4 bits carry the signal index
pub const SIG_CTRL_ID: u32 = 0x127_2100;

/// Payload length of a Signal Control data frame
pub const SIG_CTRL_DLC: u8 = 7;

/// Highest signal index the identifier can address
pub const MAX_SIG_INDEX: u8 = 0xF;

/// Set in the 32-bit ID field when the message uses an extended identifier.
/// This is unrelated to the extended flag of the control frame itself.
const EXIDE: u32 = 1 << 31;

/// Flag byte bit marking a LITTLE-endian signal. The polarity is inverted
/// relative to the `is_big_endian` field: a clear bit means big-endian.
/// The device firmware reads it this way, so it must not be flipped.
const LITTLE_ENDIAN_FLAG: u8 = 0x80;

/// Flag byte bit marking a signed signal
const SIGNED_FLAG: u8 = 0x40;

const FAMILY: &str = "Signal Control";

/// Where a signal lives in the vehicle's CAN traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDef {
    /// Signal slot on the device (0..=15)
    pub index: u8,
    /// ID of the message carrying the signal
    pub message_id: u32,
    /// True if `message_id` is an extended (29-bit) identifier
    pub is_extended: bool,
    /// Signal name from the DBC; not transmitted
    pub name: String,
    /// Start bit within the message's data field
    pub start_bit: u8,
    /// Signal size in bits
    pub size: u8,
    pub is_big_endian: bool,
    pub is_signed: bool,
}

impl SignalDef {
    /// Create a signal definition, rejecting fields the frame cannot carry
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: u8,
        message_id: u32,
        is_extended: bool,
        name: impl Into<String>,
        start_bit: u64,
        size: u64,
        is_big_endian: bool,
        is_signed: bool,
    ) -> Result<Self> {
        let name = name.into();
        if index > MAX_SIG_INDEX {
            return Err(CalError::OutOfRange(format!(
                "{}: signal index out of range: {}",
                name, index
            )));
        }
        let start_bit = u8::try_from(start_bit).map_err(|_| {
            CalError::OutOfRange(format!("{}: start bit out of range: {}", name, start_bit))
        })?;
        let size = u8::try_from(size)
            .map_err(|_| CalError::OutOfRange(format!("{}: size out of range: {}", name, size)))?;

        Ok(Self {
            index,
            message_id: message_id & EXT_MASK,
            is_extended,
            name,
            start_bit,
            size,
            is_big_endian,
            is_signed,
        })
    }

    /// Store this signal's encoding on the device and verify it
    pub fn send_encoding<B>(&self, bus: &B, config: &ProtocolConfig) -> Result<()>
    where
        B: FrameBus + ?Sized,
    {
        log::info!("Sending signal encoding {}", self);
        write_verify(self, bus, config)?;
        log::info!("Signal {} encoding OK", self.index);
        Ok(())
    }
}

impl fmt::Display for SignalDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (ID 0x{:X}{}, start {}, size {}, {}, {})",
            self.index,
            self.name,
            self.message_id,
            if self.is_extended { " ext" } else { "" },
            self.start_bit,
            self.size,
            if self.is_big_endian { "big-endian" } else { "little-endian" },
            if self.is_signed { "signed" } else { "unsigned" },
        )
    }
}

/// Build a Signal Control remote request for slot `index`
pub fn signal_request(index: u8) -> Result<Frame> {
    check_index(index)?;
    Frame::remote(SIG_CTRL_ID | u32::from(index), true)
}

fn check_index(index: u8) -> Result<()> {
    if index > MAX_SIG_INDEX {
        return Err(CalError::OutOfRange(format!(
            "signal index out of range: {}",
            index
        )));
    }
    Ok(())
}

impl ControlFrame for SignalDef {
    fn marshal(&self) -> Result<Frame> {
        check_index(self.index)?;
        let mask = if self.is_extended { EXT_MASK } else { STD_MASK };
        if self.message_id & !mask != 0 {
            return Err(CalError::OutOfRange(format!(
                "{}: message ID 0x{:X} out of range",
                self.name, self.message_id
            )));
        }

        let mut data = [0u8; SIG_CTRL_DLC as usize];
        let mut id = self.message_id & EXT_MASK;
        if self.is_extended {
            id |= EXIDE;
        }
        BigEndian::write_u32(&mut data[0..4], id);
        data[4] = self.start_bit;
        data[5] = self.size;
        if !self.is_big_endian {
            data[6] |= LITTLE_ENDIAN_FLAG;
        }
        if self.is_signed {
            data[6] |= SIGNED_FLAG;
        }

        Frame::data_frame(SIG_CTRL_ID | u32::from(self.index), true, &data)
    }

    fn remote_request(&self) -> Result<Frame> {
        signal_request(self.index)
    }

    /// Decode a reply. The name is not on the wire and comes back empty.
    fn unmarshal(frame: &Frame) -> Result<Self> {
        if !frame.extended || frame.remote || frame.id & CTRL_MASK != SIG_CTRL_ID {
            return Err(CalError::WrongFamily {
                family: FAMILY,
                id: frame.id,
            });
        }
        if frame.len != SIG_CTRL_DLC {
            return Err(CalError::WrongLength {
                family: FAMILY,
                len: frame.len,
            });
        }

        let data = frame.payload();
        let id = BigEndian::read_u32(&data[0..4]);
        Ok(Self {
            index: (frame.id & 0xF) as u8,
            message_id: id & EXT_MASK,
            is_extended: id & EXIDE != 0,
            name: String::new(),
            start_bit: data[4],
            size: data[5],
            is_big_endian: data[6] & LITTLE_ENDIAN_FLAG == 0,
            is_signed: data[6] & SIGNED_FLAG != 0,
        })
    }

    fn matches_reply(&self, reply: &Self) -> bool {
        reply.index == self.index
    }

    fn verify(&self, reply: &Self) -> bool {
        // Index and name are not verifiable from the payload
        let stamped = Self {
            index: self.index,
            name: self.name.clone(),
            ..reply.clone()
        };
        stamped == *self
    }

    fn describe(&self) -> String {
        format!("signal {}", self.index)
    }
}
