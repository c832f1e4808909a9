//! Write-verify protocol
//!
//! Every EEPROM write is confirmed by reading it back:
//! 1. send the write frame
//! 2. send the matching remote request
//! 3. wait for one reply and decode it
//! 4. compare the reply with what was written
//!
//! A mismatch is rewritten, up to `max_attempts` times. Frames from another
//! family or replies for another slot are skipped and the wait goes on within
//! the same attempt, bounded by the attempt's timeout. A timeout while
//! waiting is a hard failure, not a retry.

use crate::bus::FrameBus;
use crate::config::ProtocolConfig;
use crate::control::ControlFrame;
use crate::types::{CalError, Result};
use std::time::Instant;

/// Write `cmd` to the device and confirm it by reading it back
///
/// Returns the attempt (starting at 1) on which the reply matched.
pub fn write_verify<C, B>(cmd: &C, bus: &B, config: &ProtocolConfig) -> Result<usize>
where
    C: ControlFrame,
    B: FrameBus + ?Sized,
{
    let write = cmd.marshal()?;
    let request = cmd.remote_request()?;
    let timeout = config.timeout();
    let target = cmd.describe();

    for attempt in 1..=config.max_attempts {
        log::debug!("Writing {} (attempt {}): {}", target, attempt, write);
        bus.send(&write, timeout)?;
        bus.send(&request, timeout)?;
        let reply = await_reply(cmd, bus, Instant::now() + timeout, &target)?;

        if cmd.verify(&reply) {
            log::debug!("{} verified on attempt {}", target, attempt);
            return Ok(attempt);
        }
        log::warn!("{} verification failed; rewriting...", target);
    }

    Err(CalError::VerifyFailed(target))
}

/// Wait for a decoded reply to `cmd`, skipping unrelated traffic until `deadline`
fn await_reply<C, B>(cmd: &C, bus: &B, deadline: Instant, target: &str) -> Result<C>
where
    C: ControlFrame,
    B: FrameBus + ?Sized,
{
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CalError::Timeout("receive a reply"));
        }
        let frame = bus.receive(remaining)?;

        match C::unmarshal(&frame) {
            Ok(reply) if cmd.matches_reply(&reply) => return Ok(reply),
            Ok(_) => log::trace!("Ignoring reply {} while verifying {}", frame, target),
            Err(e) if e.is_wrong_family() => {
                log::trace!("Ignoring frame {} while verifying {}", frame, target)
            }
            Err(e) => return Err(e),
        }
    }
}
