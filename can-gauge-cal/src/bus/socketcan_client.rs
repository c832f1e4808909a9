//! SocketCAN interface for Linux
//!
//! One raw CAN socket is shared by both bus workers. Using a single socket
//! matters: the kernel loops frames written on one socket back to every other
//! socket on the same device, so a separate read socket would see our own
//! writes as if they were replies.

use super::CanInterface;
use crate::types::{CalError, Frame, Result};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};
use std::io;
use std::time::Duration;

/// A SocketCAN device such as `can0` or `vcan0`
pub struct SocketCanInterface {
    socket: CanSocket,
}

impl SocketCanInterface {
    /// Open `device`; reads wake up every `poll_interval` so the receiver
    /// worker can notice shutdown
    pub fn open(device: &str, poll_interval: Duration) -> Result<Self> {
        let socket = CanSocket::open(device).map_err(|source| CalError::DeviceOpen {
            device: device.to_string(),
            source,
        })?;

        socket
            .set_read_timeout(poll_interval)
            .map_err(|source| CalError::DeviceOpen {
                device: device.to_string(),
                source,
            })?;

        Ok(Self { socket })
    }
}

impl CanInterface for SocketCanInterface {
    fn transmit(&self, frame: &Frame) -> io::Result<()> {
        let socket_frame = to_socket_frame(frame)?;
        self.socket.write_frame(&socket_frame)
    }

    fn receive(&self) -> io::Result<Option<Frame>> {
        match self.socket.read_frame() {
            Ok(CanFrame::Error(err)) => {
                log::debug!("Ignoring CAN error frame: {:?}", err);
                Ok(None)
            }
            Ok(frame) => Ok(Some(from_socket_frame(&frame))),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn to_socket_frame(frame: &Frame) -> io::Result<CanFrame> {
    let id = if frame.extended {
        ExtendedId::new(frame.id).map(Id::Extended)
    } else {
        u16::try_from(frame.id)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
    }
    .ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid CAN ID 0x{:X}", frame.id),
        )
    })?;

    let socket_frame = if frame.remote {
        CanFrame::new_remote(id, frame.len as usize)
    } else {
        CanFrame::new(id, frame.payload())
    };
    socket_frame.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("failed to build CAN frame {}", frame),
        )
    })
}

fn from_socket_frame(frame: &CanFrame) -> Frame {
    let (id, extended) = match frame.id() {
        Id::Standard(id) => (id.as_raw() as u32, false),
        Id::Extended(id) => (id.as_raw(), true),
    };

    let mut out = Frame {
        id,
        extended,
        remote: frame.is_remote_frame(),
        len: frame.dlc().min(8) as u8,
        ..Frame::default()
    };
    let data = frame.data();
    let n = data.len().min(8);
    out.data[..n].copy_from_slice(&data[..n]);
    out
}
