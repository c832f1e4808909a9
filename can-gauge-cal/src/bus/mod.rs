//! CAN bus transport
//!
//! A [`Bus`] owns one physical CAN interface and two worker threads:
//! - the transmitter accepts one frame at a time over a rendezvous channel
//!   and is the only code that ever writes to the interface
//! - the receiver drains the interface and hands every inbound frame to
//!   whichever caller is waiting in [`Bus::receive`]
//!
//! Inbound frames are not correlated with outbound ones. A caller expecting a
//! reply must check the frame it gets back before trusting it, and exchanges
//! from unrelated callers must not be interleaved on one bus.

use crate::config::ProtocolConfig;
use crate::types::{CalError, Frame, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
pub mod socketcan_client;

#[cfg(target_os = "linux")]
pub use self::socketcan_client::SocketCanInterface;

/// A physical CAN interface
///
/// Implementations must be usable from the two bus workers at the same time:
/// one thread only calls `transmit`, the other only calls `receive`.
pub trait CanInterface: Send + Sync {
    /// Write one frame to the wire
    fn transmit(&self, frame: &Frame) -> io::Result<()>;

    /// Read one frame, or `Ok(None)` if nothing arrived within the
    /// implementation's poll interval
    fn receive(&self) -> io::Result<Option<Frame>>;
}

/// Frame-level send/receive with explicit deadlines
///
/// This is the seam the write-verify protocol is written against.
pub trait FrameBus {
    fn send(&self, frame: &Frame, timeout: Duration) -> Result<()>;
    fn receive(&self, timeout: Duration) -> Result<Frame>;
}

/// A request handed to the transmitter worker
struct Transmission {
    frame: Frame,
    deadline: Instant,
    done: Sender<Result<()>>,
}

/// Connection to one CAN device
pub struct Bus {
    device: String,
    requests: Sender<Transmission>,
    frames: Receiver<io::Result<Frame>>,
    /// Disconnects when `cancel` is dropped
    cancelled: Receiver<()>,
    cancel: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Bus {
    /// Open a SocketCAN device and start the bus workers
    #[cfg(target_os = "linux")]
    pub fn connect(device: &str, config: &ProtocolConfig) -> Result<Self> {
        log::info!("Opening connection to {}", device);
        let iface = SocketCanInterface::open(device, config.poll_interval())?;
        Self::with_interface(device, iface)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn connect(device: &str, _config: &ProtocolConfig) -> Result<Self> {
        Err(CalError::DeviceOpen {
            device: device.to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "SocketCAN is only available on Linux",
            ),
        })
    }

    /// Start the bus workers on an already opened interface
    pub fn with_interface<I>(device: impl Into<String>, iface: I) -> Result<Self>
    where
        I: CanInterface + 'static,
    {
        let device = device.into();
        let iface: Arc<dyn CanInterface> = Arc::new(iface);

        let (request_tx, request_rx) = bounded(0);
        let (frame_tx, frame_rx) = bounded(0);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let transmitter = {
            let iface = Arc::clone(&iface);
            let cancelled = cancel_rx.clone();
            thread::Builder::new()
                .name(format!("{}-tx", device))
                .spawn(move || transmit_loop(iface.as_ref(), request_rx, cancelled))?
        };
        let receiver = {
            let cancelled = cancel_rx.clone();
            thread::Builder::new()
                .name(format!("{}-rx", device))
                .spawn(move || receive_loop(iface.as_ref(), frame_tx, cancelled))?
        };

        log::debug!("Bus workers started for {}", device);

        Ok(Self {
            device,
            requests: request_tx,
            frames: frame_rx,
            cancelled: cancel_rx,
            cancel: Mutex::new(Some(cancel_tx)),
            workers: Mutex::new(vec![transmitter, receiver]),
        })
    }

    /// Name of the device this bus was opened on
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Hand a frame to the transmitter and wait for the outcome
    ///
    /// The transmitter keeps retrying while the interface reports that its
    /// transmit buffer is full; any other write error is returned as is.
    pub fn send(&self, frame: &Frame, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = bounded(1);
        let request = Transmission {
            frame: *frame,
            deadline,
            done: done_tx,
        };

        let accepted = select! {
            send(self.requests, request) -> res => res.map_err(|_| self.closed_error()),
            recv(self.cancelled) -> _ => Err(CalError::Cancelled),
            default(timeout) => Err(CalError::Timeout("hand a frame to the transmitter")),
        };
        accepted?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        select! {
            recv(done_rx) -> res => res.unwrap_or_else(|_| Err(self.closed_error())),
            recv(self.cancelled) -> _ => Err(CalError::Cancelled),
            default(remaining) => Err(CalError::Timeout("transmit a frame")),
        }
    }

    /// Take the next inbound frame, whatever exchange it belongs to
    pub fn receive(&self, timeout: Duration) -> Result<Frame> {
        select! {
            recv(self.frames) -> msg => match msg {
                Ok(Ok(frame)) => Ok(frame),
                Ok(Err(e)) => Err(CalError::IoError(e)),
                Err(_) => Err(self.closed_error()),
            },
            recv(self.cancelled) -> _ => Err(CalError::Cancelled),
            default(timeout) => Err(CalError::Timeout("receive a frame")),
        }
    }

    /// Take an inbound frame only if one is ready right now
    ///
    /// A receive error on the interface is returned once; the receiver stops
    /// after it.
    pub fn try_receive(&self) -> Result<Option<Frame>> {
        match self.frames.try_recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(e)) => Err(CalError::IoError(e)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.closed_error()),
        }
    }

    /// True once [`Bus::close`] has been called
    pub fn is_closed(&self) -> bool {
        is_cancelled(&self.cancelled)
    }

    /// Stop both workers and release the interface
    ///
    /// Operations blocked on this bus from other threads return
    /// [`CalError::Cancelled`].
    pub fn close(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(cancel) = cancel else {
            return;
        };
        drop(cancel);

        log::info!("Closing connection to {}", self.device);
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if worker.join().is_err() {
                log::error!("A bus worker for {} panicked", self.device);
            }
        }
    }

    fn closed_error(&self) -> CalError {
        if self.is_closed() {
            CalError::Cancelled
        } else {
            CalError::BusClosed
        }
    }
}

impl FrameBus for Bus {
    fn send(&self, frame: &Frame, timeout: Duration) -> Result<()> {
        Bus::send(self, frame, timeout)
    }

    fn receive(&self, timeout: Duration) -> Result<Frame> {
        Bus::receive(self, timeout)
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_cancelled(cancelled: &Receiver<()>) -> bool {
    matches!(cancelled.try_recv(), Err(TryRecvError::Disconnected))
}

fn transmit_loop(
    iface: &dyn CanInterface,
    requests: Receiver<Transmission>,
    cancelled: Receiver<()>,
) {
    loop {
        let request = select! {
            recv(requests) -> msg => msg.ok(),
            recv(cancelled) -> _ => None,
        };
        let Some(request) = request else {
            break;
        };

        let result = transmit(iface, &request.frame, request.deadline, &cancelled);
        // The sender may have given up already
        let _ = request.done.send(result);
    }
    log::debug!("Transmitter stopped");
}

fn transmit(
    iface: &dyn CanInterface,
    frame: &Frame,
    deadline: Instant,
    cancelled: &Receiver<()>,
) -> Result<()> {
    loop {
        match iface.transmit(frame) {
            Ok(()) => {
                log::trace!("TX {}", frame);
                return Ok(());
            }
            Err(e) if is_no_buffer_space(&e) => {
                if is_cancelled(cancelled) {
                    return Err(CalError::Cancelled);
                }
                if Instant::now() >= deadline {
                    return Err(CalError::Timeout("transmit a frame"));
                }
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(CalError::IoError(e)),
        }
    }
}

#[cfg(target_os = "linux")]
fn is_no_buffer_space(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ENOBUFS)
}

#[cfg(not(target_os = "linux"))]
fn is_no_buffer_space(_e: &io::Error) -> bool {
    false
}

fn receive_loop(
    iface: &dyn CanInterface,
    frames: Sender<io::Result<Frame>>,
    cancelled: Receiver<()>,
) {
    while !is_cancelled(&cancelled) {
        let inbound = match iface.receive() {
            Ok(Some(frame)) => {
                log::trace!("RX {}", frame);
                Ok(frame)
            }
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        let fatal = inbound.is_err();

        let delivered = select! {
            send(frames, inbound) -> res => res.is_ok(),
            recv(cancelled) -> _ => false,
        };
        if !delivered || fatal {
            break;
        }
    }
    log::debug!("Receiver stopped");
}
