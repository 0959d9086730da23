//! Deadline and retry primitives
//!
//! Both channels are synchronous and pace themselves with plain sleeps: the
//! host channel re-reads a shared file until a matching response shows up,
//! the serial channel polls the port for buffered bytes. The time source is
//! injectable so the loops can be exercised in tests without real delays.

use std::time::{Duration, Instant};

use crate::error::ChannelError;

/// Time source used by the poll and retry loops.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Run `write` up to `max_retries` times, sleeping `retry_delay` between
/// failed attempts.
///
/// The shared command file may be transiently held open by the host
/// application's monitor, so a failed write is ordinarily recoverable on a
/// later attempt. The final failure is surfaced as [`ChannelError::Io`]
/// with the attempt count.
pub fn write_with_retry<C, F>(
    clock: &C,
    max_retries: u32,
    retry_delay: Duration,
    mut write: F,
) -> Result<(), ChannelError>
where
    C: Clock,
    F: FnMut() -> std::io::Result<()>,
{
    let attempts = max_retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match write() {
            Ok(()) => return Ok(()),
            Err(source) if attempt >= attempts => {
                return Err(ChannelError::Io {
                    attempts: attempt,
                    source,
                })
            }
            Err(err) => {
                tracing::debug!(attempt, error = %err, "write failed, retrying");
                clock.sleep(retry_delay);
            }
        }
    }
}

/// Poll `try_read` every `interval` until it produces a value or `timeout`
/// elapses.
///
/// Returns `None` on expiry; the caller decides what the timeout means.
/// The first attempt always runs, even with a zero timeout, so a response
/// that is already present is never missed.
pub fn poll_until<C, F, T>(
    clock: &C,
    timeout: Duration,
    interval: Duration,
    mut try_read: F,
) -> Option<T>
where
    C: Clock,
    F: FnMut() -> Option<T>,
{
    let start = clock.now();
    loop {
        if let Some(value) = try_read() {
            return Some(value);
        }
        if clock.now().duration_since(start) >= timeout {
            return None;
        }
        clock.sleep(interval);
    }
}
