//! Serial command channel
//!
//! One command per port acquisition: the port is opened, the command is
//! framed and written, the optional readiness poll and response capture
//! run, and the handle is dropped (closing the port) on every exit
//! path. Reconnecting per command costs a little time but guarantees a
//! failed exchange can never wedge the port for the next one.
//!
//! Unlike the host channel there is no numbering: the instrument only
//! speaks when spoken to, so the port's own byte stream is the response.

use std::io;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ChannelError;
use crate::timing::{poll_until, Clock, SystemClock};

use super::config::SerialChannelConfig;
use super::port::{clear_buffers, open_port, SerialIo};

/// Busy-poll readiness sub-protocol.
///
/// Some instruments execute commands asynchronously and expose completion
/// only through a status query: the device answers the query with a line
/// that contains a designated marker character once it has gone idle.
/// `Busy -> query -> {Busy, Ready}`: the loop repeats the query until the
/// marker appears.
#[derive(Debug, Clone)]
pub struct ReadyPoll {
    /// Status query written on each iteration, framed like any command.
    pub query: String,

    /// Character whose presence in the reply means the device is idle.
    pub ready_marker: char,

    /// Upper bound on the whole wait. `None` polls indefinitely, matching
    /// instruments whose operations have no predictable duration.
    pub max_wait: Option<Duration>,
}

impl ReadyPoll {
    /// Unbounded readiness poll.
    pub fn new(query: impl Into<String>, ready_marker: char) -> Self {
        Self {
            query: query.into(),
            ready_marker,
            max_wait: None,
        }
    }

    /// Bound the wait; expiry surfaces as [`ChannelError::Timeout`].
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Exclusive serial channel to a pump or valve instrument.
pub struct SerialChannel<C: Clock = SystemClock> {
    config: SerialChannelConfig,
    clock: C,
}

impl SerialChannel {
    /// Build a channel for the configured port. The port itself is opened
    /// per command, not here.
    pub fn new(config: SerialChannelConfig) -> Result<Self, ChannelError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SerialChannel<C> {
    /// Build a channel with an explicit clock (tests inject a virtual
    /// one).
    pub fn with_clock(config: SerialChannelConfig, clock: C) -> Result<Self, ChannelError> {
        if config.port_name.is_empty() {
            return Err(ChannelError::Configuration(
                "serial port name is empty".to_string(),
            ));
        }
        Ok(Self { config, clock })
    }

    /// The configuration this channel was built with.
    pub fn config(&self) -> &SerialChannelConfig {
        &self.config
    }

    /// Send one framed command over a freshly opened port.
    ///
    /// When `completion` is given, the readiness poll runs after the write
    /// and blocks until the device signals idle (or the poll's `max_wait`
    /// expires). When `capture_response` is set, the channel then waits up
    /// to `response_timeout` for reply bytes and returns them decoded; a
    /// quiet line yields `Some("")` rather than an error, since many
    /// commands simply have nothing to say. With `capture_response` off
    /// the result is `Ok(None)`.
    pub fn send_command(
        &self,
        command: &str,
        completion: Option<&ReadyPoll>,
        capture_response: bool,
        response_timeout: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let mut port = open_port(
            &self.config.port_name,
            self.config.baud_rate,
            self.config.read_timeout,
        )?;
        clear_buffers(port.as_mut())?;
        self.run_command(&mut port, command, completion, capture_response, response_timeout)
        // `port` drops here on every path, releasing the device.
    }

    fn run_command<S: SerialIo>(
        &self,
        io: &mut S,
        command: &str,
        completion: Option<&ReadyPoll>,
        capture_response: bool,
        response_timeout: Duration,
    ) -> Result<Option<String>, ChannelError> {
        self.write_framed(io, command)?;

        if let Some(poll) = completion {
            self.wait_until_ready(io, poll)?;
        }

        if capture_response {
            let response = self.capture_response(io, response_timeout)?;
            if self.config.verbose {
                info!(command, response = %response, "serial response");
            } else {
                debug!(command, response = %response, "serial response");
            }
            Ok(Some(response))
        } else {
            Ok(None)
        }
    }

    /// Frame and write one command: `"<prefix><address><command>\r"`.
    fn write_framed<S: SerialIo>(&self, io: &mut S, command: &str) -> Result<(), ChannelError> {
        let framed = format!(
            "{}{}{}\r",
            self.config.prefix, self.config.address, command
        );
        if self.config.verbose {
            info!(command, "serial write");
        } else {
            debug!(command, "serial write");
        }
        io.write_all(framed.as_bytes()).map_err(write_failure)?;
        io.flush().map_err(write_failure)?;
        // Give the device time to act before anything else touches the
        // line.
        self.clock.sleep(self.config.post_write_delay);
        Ok(())
    }

    /// Repeat the status query until the device's answer contains the
    /// ready marker. Paced by the post-write delay of each query.
    fn wait_until_ready<S: SerialIo>(
        &self,
        io: &mut S,
        poll: &ReadyPoll,
    ) -> Result<(), ChannelError> {
        let start = self.clock.now();
        loop {
            self.write_framed(io, &poll.query)?;
            let reply = read_available(io)?;
            if reply.contains(poll.ready_marker) {
                debug!(query = %poll.query, "device ready");
                return Ok(());
            }
            if let Some(max_wait) = poll.max_wait {
                if self.clock.now().duration_since(start) >= max_wait {
                    return Err(ChannelError::Timeout {
                        sequence_number: None,
                        timeout: max_wait,
                    });
                }
            }
        }
    }

    /// Wait for any reply bytes, then drain and decode them. A line that
    /// stays quiet until the deadline yields an empty string.
    fn capture_response<S: SerialIo>(
        &self,
        io: &mut S,
        response_timeout: Duration,
    ) -> Result<String, ChannelError> {
        let arrived = poll_until(
            &self.clock,
            response_timeout,
            self.config.poll_interval,
            || match io.bytes_to_read() {
                Ok(0) => None,
                Ok(_) => Some(Ok(())),
                Err(err) => Some(Err(err)),
            },
        );
        match arrived {
            Some(Ok(())) => read_available(io),
            Some(Err(source)) => Err(ChannelError::Io {
                attempts: 1,
                source,
            }),
            None => Ok(String::new()),
        }
    }
}

/// Drain whatever is buffered on the receive side, decoded lossily; the
/// instruments answer in plain ASCII and a mangled byte should not abort
/// the exchange.
fn read_available<S: SerialIo>(io: &mut S) -> Result<String, ChannelError> {
    let available = io.bytes_to_read().map_err(|source| ChannelError::Io {
        attempts: 1,
        source,
    })? as usize;
    if available == 0 {
        return Ok(String::new());
    }
    let mut buffer = vec![0u8; available];
    io.read_exact(&mut buffer).map_err(|source| ChannelError::Io {
        attempts: 1,
        source,
    })?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_failure(source: io::Error) -> ChannelError {
    ChannelError::Io {
        attempts: 1,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::test_clock::VirtualClock;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// In-memory serial double. Each completed write (terminated by the
    /// carriage return) arms the next scripted reply, which becomes
    /// readable afterwards, matching the request/answer rhythm of a real
    /// instrument.
    #[derive(Default)]
    struct MockSerial {
        sent: Vec<u8>,
        replies: VecDeque<Vec<u8>>,
        pending: Vec<u8>,
        fail_writes: bool,
    }

    impl MockSerial {
        fn with_replies<I: IntoIterator<Item = &'static [u8]>>(replies: I) -> Self {
            Self {
                replies: replies.into_iter().map(<[u8]>::to_vec).collect(),
                ..Self::default()
            }
        }

        fn sent_text(&self) -> String {
            String::from_utf8_lossy(&self.sent).into_owned()
        }
    }

    impl io::Read for MockSerial {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    impl io::Write for MockSerial {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.sent.extend_from_slice(buf);
            if buf.ends_with(b"\r") {
                if let Some(reply) = self.replies.pop_front() {
                    self.pending.extend_from_slice(&reply);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialIo for MockSerial {
        fn bytes_to_read(&self) -> io::Result<u32> {
            Ok(self.pending.len() as u32)
        }
    }

    fn test_channel() -> SerialChannel<VirtualClock> {
        let config = SerialChannelConfig {
            port_name: "/dev/ttyUSB0".to_string(),
            prefix: "/".to_string(),
            address: "1".to_string(),
            ..SerialChannelConfig::default()
        };
        SerialChannel::with_clock(config, VirtualClock::new()).unwrap()
    }

    #[test]
    fn empty_port_name_is_rejected_at_construction() {
        let result = SerialChannel::new(SerialChannelConfig::default());
        assert!(matches!(result.err(), Some(ChannelError::Configuration(_))));
    }

    #[test]
    fn command_is_framed_with_prefix_address_and_cr() {
        let channel = test_channel();
        let mut mock = MockSerial::default();
        let result = channel
            .run_command(&mut mock, "IR", None, false, Duration::from_secs(1))
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(mock.sent_text(), "/1IR\r");
        // The post-write delay paced the exchange.
        assert_eq!(channel.clock.slept(), vec![Duration::from_millis(200)]);
    }

    #[test]
    fn captured_response_is_decoded_and_returned() {
        let channel = test_channel();
        let mut mock = MockSerial::with_replies([&b"ok\x03"[..]]);
        let result = channel
            .run_command(&mut mock, "Q", None, true, Duration::from_secs(1))
            .unwrap();
        assert_eq!(result.as_deref(), Some("ok\u{3}"));
    }

    #[test]
    fn quiet_line_capture_times_out_into_empty_response() {
        let channel = test_channel();
        let mut mock = MockSerial::default();
        let timeout = Duration::from_secs(1);
        let result = channel
            .run_command(&mut mock, "Q", None, true, timeout)
            .unwrap();
        assert_eq!(result.as_deref(), Some(""));
        // Write pacing plus a full capture window of polls.
        let total = channel.clock.total_slept();
        assert!(total >= timeout);
    }

    #[test]
    fn readiness_poll_repeats_query_until_marker() {
        let channel = test_channel();
        // Main command gets no reply; the query is answered busy twice,
        // then ready.
        let mut mock = MockSerial::with_replies([&b""[..], &b"@"[..], &b"@"[..], &b"`"[..]]);
        let poll = ReadyPoll::new("QR", '`');
        channel
            .run_command(&mut mock, "A3000", Some(&poll), false, Duration::from_secs(1))
            .unwrap();
        assert_eq!(mock.sent_text(), "/1A3000\r/1QR\r/1QR\r/1QR\r");
    }

    #[test]
    fn bounded_readiness_poll_times_out() {
        let channel = test_channel();
        // Never ready.
        let mut mock = MockSerial::with_replies(std::iter::repeat_n(&b"@"[..], 16));
        let poll = ReadyPoll::new("QR", '`').with_max_wait(Duration::from_millis(500));
        let result =
            channel.run_command(&mut mock, "A3000", Some(&poll), false, Duration::from_secs(1));
        match result {
            Err(ChannelError::Timeout {
                sequence_number,
                timeout,
            }) => {
                assert_eq!(sequence_number, None);
                assert_eq!(timeout, Duration::from_millis(500));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn ready_marker_in_first_query_reply_completes_immediately() {
        let channel = test_channel();
        let mut mock = MockSerial::with_replies([&b""[..], &b"`"[..]]);
        let poll = ReadyPoll::new("QR", '`');
        channel
            .run_command(&mut mock, "A10", Some(&poll), false, Duration::from_secs(1))
            .unwrap();
        assert_eq!(mock.sent_text(), "/1A10\r/1QR\r");
    }

    #[test]
    fn write_failure_surfaces_as_io_error() {
        let channel = test_channel();
        let mut mock = MockSerial {
            fail_writes: true,
            ..MockSerial::default()
        };
        let result = channel.run_command(&mut mock, "Z", None, false, Duration::from_secs(1));
        assert!(matches!(result, Err(ChannelError::Io { attempts: 1, .. })));
    }
}
