//! Simulated gauge interface for integration tests
//!
//! Emulates the device's control frame handling on top of the
//! `CanInterface` seam: data frames of either control family are stored in a
//! fake EEPROM, remote requests are answered with the stored frame.

#![allow(dead_code)]

use can_gauge_cal::{CanInterface, Frame};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CTRL_MASK: u32 = 0x1FF_FF00;
const SIG_CTRL_ID: u32 = 0x127_2100;
const TBL_CTRL_ID: u32 = 0x127_2000;

#[derive(Default)]
pub struct DeviceState {
    /// Stored data frames keyed by control frame ID
    pub eeprom: HashMap<u32, Frame>,
    /// Number of upcoming replies to corrupt
    pub corrupt_replies: usize,
    /// Corrupt every reply
    pub always_corrupt: bool,
    /// Ignore remote requests
    pub silent: bool,
    /// Frames to emit before the next reply, as if other nodes were talking
    pub noise: Vec<Frame>,
    /// Every frame the device received
    pub received: Vec<Frame>,
}

/// Handle shared between the test and the interface owned by the bus
#[derive(Clone)]
pub struct SimulatedDevice {
    pub state: Arc<Mutex<DeviceState>>,
    outbound: Sender<Frame>,
    inbound: Receiver<Frame>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        let (outbound, inbound) = unbounded();
        Self {
            state: Arc::new(Mutex::new(DeviceState::default())),
            outbound,
            inbound,
        }
    }

    pub fn with_state(self, f: impl FnOnce(&mut DeviceState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn stored(&self, id: u32) -> Option<Frame> {
        self.state.lock().unwrap().eeprom.get(&id).copied()
    }

    pub fn received(&self) -> Vec<Frame> {
        self.state.lock().unwrap().received.clone()
    }
}

fn is_control(frame: &Frame) -> bool {
    let family = frame.id & CTRL_MASK;
    frame.extended && (family == SIG_CTRL_ID || family == TBL_CTRL_ID)
}

impl CanInterface for SimulatedDevice {
    fn transmit(&self, frame: &Frame) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.received.push(*frame);
        if !is_control(frame) {
            return Ok(());
        }

        if !frame.remote {
            state.eeprom.insert(frame.id, *frame);
            return Ok(());
        }
        if state.silent {
            return Ok(());
        }

        for noise in std::mem::take(&mut state.noise) {
            let _ = self.outbound.send(noise);
        }
        if let Some(mut reply) = state.eeprom.get(&frame.id).copied() {
            if state.always_corrupt || state.corrupt_replies > 0 {
                state.corrupt_replies = state.corrupt_replies.saturating_sub(1);
                reply.data[0] ^= 0x01;
            }
            let _ = self.outbound.send(reply);
        }
        Ok(())
    }

    fn receive(&self) -> io::Result<Option<Frame>> {
        Ok(self.inbound.recv_timeout(Duration::from_millis(10)).ok())
    }
}
