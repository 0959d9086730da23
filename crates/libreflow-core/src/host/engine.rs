//! Command correlation engine
//!
//! Turns a logical `send(command, timeout)` into the numbered
//! write/poll/match cycle the host application understands. The host's
//! monitor macro polls the command file on its own schedule, executes
//! whatever it finds there, and overwrites the response file with a record
//! carrying the same number. Nothing about the medium is synchronized, so
//! correctness rests on the sequence numbers alone: a response counts only
//! if its number equals the number of the command we just wrote, and
//! everything else (stale records, torn writes, empty files) is treated
//! as "not yet" and polled past.
//!
//! The host also keeps its own last-seen command number across sessions.
//! Once the numbering range is exhausted, both sides must agree on a fresh
//! zero or responses stop correlating forever; the reset handshake exists
//! for that, and is a correctness requirement rather than an optimization.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::timing::{poll_until, write_with_retry, Clock, SystemClock};

use super::config::HostChannelConfig;
use super::transport::{CommandFiles, Transport};
use super::wire::{self, Outcome};

/// Assignment the host recognizes as "zero your last-seen command number".
/// Sent one past the normal numbering range so the monitor always treats
/// it as new.
pub const RESET_COMMAND: &str = "last_command_number = 0";

/// Echo probe used by [`HostChannel::verify_connection`].
const PROBE_COMMAND: &str = "response$ = \"CONNECTION_TEST\"";
const PROBE_TOKEN: &str = "CONNECTION_TEST";

/// Correlated command channel to the host application.
///
/// One instance per host connection, alive for the whole session. The
/// protocol allows a single outstanding command, which the API enforces by
/// taking `&mut self` for every send; the type is deliberately not
/// [`Clone`], so the sequence counter can never be shared.
pub struct HostChannel<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    config: HostChannelConfig,
    sequence_number: u32,
}

impl HostChannel<CommandFiles> {
    /// Set up the communication directory and synchronize counters with
    /// the host.
    ///
    /// Creates the directory and both files if missing, then performs the
    /// initial counter reset so both sides start from zero. Fails with
    /// [`ChannelError::Configuration`] when the directory cannot be set up.
    pub fn connect(config: HostChannelConfig) -> Result<Self, ChannelError> {
        config.validate()?;
        let transport = CommandFiles::create(
            &config.comm_dir,
            &config.command_filename,
            &config.response_filename,
        )?;
        Self::with_clock(transport, config, SystemClock)
    }
}

impl<T: Transport> HostChannel<T> {
    /// Build a channel over an arbitrary transport (an in-memory double,
    /// an alternative medium) and synchronize counters.
    pub fn with_transport(transport: T, config: HostChannelConfig) -> Result<Self, ChannelError> {
        Self::with_clock(transport, config, SystemClock)
    }
}

impl<T: Transport, C: Clock> HostChannel<T, C> {
    /// Build a channel with an explicit clock. Tests inject a virtual
    /// clock here so the poll loops run without real delays.
    pub fn with_clock(
        transport: T,
        config: HostChannelConfig,
        clock: C,
    ) -> Result<Self, ChannelError> {
        config.validate()?;
        let mut channel = Self {
            transport,
            clock,
            config,
            sequence_number: 0,
        };
        // Initial handshake: the host may carry a counter from a previous
        // session.
        channel.reset_counter()?;
        Ok(channel)
    }

    /// Sequence number of the most recently issued command.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// The configuration this channel was built with.
    pub fn config(&self) -> &HostChannelConfig {
        &self.config
    }

    /// Send one command and wait for its numbered response.
    ///
    /// Returns `Ok(Some(payload))` for responses carrying data, `Ok(None)`
    /// when the host answered with the no-value sentinel, and
    /// [`ChannelError::Device`] when the host reported a command failure.
    /// Responses bearing any other number are ignored without error; if no
    /// matching one appears within `timeout`, the result is
    /// [`ChannelError::Timeout`].
    pub fn send(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ChannelError> {
        if command.is_empty() {
            return Err(ChannelError::Protocol("empty command".to_string()));
        }
        if timeout.is_zero() {
            return Err(ChannelError::Protocol("timeout must be non-zero".to_string()));
        }

        if self.sequence_number >= self.config.max_sequence_number {
            self.reset_counter()?;
        }

        self.sequence_number += 1;
        let sequence_number = self.sequence_number;

        if self.config.verbose {
            info!(sequence_number, command, "sending command");
        } else {
            debug!(sequence_number, command, "sending command");
        }

        self.write_numbered(sequence_number, command)?;
        let payload = self.wait_for_response(sequence_number, timeout)?;

        let value = match wire::classify(&payload) {
            Outcome::DeviceError(message) => {
                warn!(sequence_number, message = %message, "host reported command failure");
                return Err(ChannelError::Device(message));
            }
            Outcome::NoValue => None,
            Outcome::Value(value) => Some(value),
        };

        if self.config.verbose {
            info!(sequence_number, response = ?value, "received response");
        } else {
            debug!(sequence_number, response = ?value, "received response");
        }

        // The wraparound condition is re-checked after the send as well,
        // so the next command starts from a synchronized zero.
        if self.sequence_number >= self.config.max_sequence_number {
            self.reset_counter()?;
        }

        Ok(value)
    }

    /// Send a command using the configured default timeout.
    pub fn send_default(&mut self, command: &str) -> Result<Option<String>, ChannelError> {
        self.send(command, self.config.default_timeout)
    }

    /// Check that the host's monitor is alive by sending an echo probe and
    /// looking for the echoed token. All failures map to `false`.
    pub fn verify_connection(&mut self, timeout: Duration) -> bool {
        match self.send(PROBE_COMMAND, timeout) {
            Ok(Some(response)) => response.contains(PROBE_TOKEN),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "connection probe failed");
                false
            }
        }
    }

    /// Re-synchronize both sides' counters to zero, then give the host a
    /// settle period to process the reset.
    fn reset_counter(&mut self) -> Result<(), ChannelError> {
        info!("resetting command counter");
        let reset_number = self.config.max_sequence_number + 1;
        self.write_numbered(reset_number, RESET_COMMAND)?;
        self.sequence_number = 0;
        self.clock.sleep(self.config.reset_settle);
        Ok(())
    }

    fn write_numbered(&mut self, sequence_number: u32, command: &str) -> Result<(), ChannelError> {
        let record = wire::encode_utf16le(&wire::format_numbered(sequence_number, command));
        let transport = &mut self.transport;
        write_with_retry(
            &self.clock,
            self.config.max_retries,
            self.config.retry_delay,
            || transport.write(&record),
        )
    }

    fn wait_for_response(
        &mut self,
        sequence_number: u32,
        timeout: Duration,
    ) -> Result<String, ChannelError> {
        let transport = &mut self.transport;
        poll_until(&self.clock, timeout, self.config.retry_delay, || {
            let bytes = transport.try_read()?;
            let content = wire::decode_utf16(&bytes)?;
            let (number, payload) = wire::split_numbered(content.trim())?;
            if number == sequence_number {
                Some(payload.to_string())
            } else {
                // Stale record from an earlier command; keep polling.
                None
            }
        })
        .ok_or(ChannelError::Timeout {
            sequence_number: Some(sequence_number),
            timeout,
        })
    }
}
