//! Calibration tables
//!
//! A table maps a signal's raw value (key) to a gauge output (value). The
//! device stores exactly [`MAX_TAB_ROWS`] rows per signal with keys in
//! ascending order, so a table is kept sorted and deduplicated as it is
//! built and padded to full size when it is sent.

pub mod csv;

pub use self::csv::{parse_table, parse_table_str};

use crate::bus::FrameBus;
use crate::config::ProtocolConfig;
use crate::control::table::MAX_TABLE_SIG_INDEX;
use crate::control::Row;
use crate::types::{CalError, Result};
use crate::verify::write_verify;
use std::thread;

/// Number of rows the device stores per table
pub const MAX_TAB_ROWS: usize = 32;

/// A key/value pair of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: i32,
    pub val: u16,
}

/// Sorted calibration table for one signal slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    sig_index: u8,
    entries: Vec<Entry>,
}

impl Table {
    /// Create an empty table for signal slot `sig_index`
    pub fn new(sig_index: u8) -> Result<Self> {
        if sig_index > MAX_TABLE_SIG_INDEX {
            return Err(CalError::OutOfRange(format!(
                "table signal index out of range: {}",
                sig_index
            )));
        }
        Ok(Self {
            sig_index,
            entries: Vec::with_capacity(MAX_TAB_ROWS),
        })
    }

    pub fn sig_index(&self) -> u8 {
        self.sig_index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Insert a row, keeping the table sorted by key
    pub fn insert(&mut self, key: i32, val: u16) -> Result<()> {
        if self.entries.len() >= MAX_TAB_ROWS {
            return Err(CalError::TableFull {
                sig_index: self.sig_index,
                max: MAX_TAB_ROWS,
            });
        }

        match self.entries.binary_search_by_key(&key, |e| e.key) {
            Ok(_) => Err(CalError::DuplicateKey(key)),
            Err(i) => {
                self.entries.insert(i, Entry { key, val });
                Ok(())
            }
        }
    }

    /// The rows exactly as they will be written, including padding
    ///
    /// Unused slots repeat the last populated row so the device never reads
    /// back stale EEPROM contents. Yields nothing for an empty table.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        let last = self.entries.last().copied();
        (0..MAX_TAB_ROWS).filter_map(move |i| {
            let entry = self.entries.get(i).copied().or(last)?;
            Some(Row::new(self.sig_index, i as u8, entry.key, entry.val))
        })
    }

    /// Write every row of the table to the device, verifying each one
    pub fn send<B>(&self, bus: &B, config: &ProtocolConfig) -> Result<()>
    where
        B: FrameBus + ?Sized,
    {
        if self.is_empty() {
            return Err(CalError::EmptyTable(self.sig_index));
        }

        log::info!(
            "Sending table {} ({} rows, padded to {})",
            self.sig_index,
            self.len(),
            MAX_TAB_ROWS
        );
        for row in self.rows() {
            write_verify(&row, bus, config)?;
            if !config.row_delay().is_zero() {
                thread::sleep(config.row_delay());
            }
        }
        log::info!("Table {} OK", self.sig_index);
        Ok(())
    }
}
