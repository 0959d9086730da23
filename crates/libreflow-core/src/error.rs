//! Channel errors

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur on either communication channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The medium could not be written (or the serial port opened) after
    /// exhausting retries.
    #[error("I/O failure after {attempts} attempt(s): {source}")]
    Io {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The error returned by the final attempt.
        #[source]
        source: std::io::Error,
    },

    /// No correlating response (host channel) or ready signal (serial
    /// channel) arrived before the deadline.
    #[error("timed out after {timeout:?}{pending}", pending = pending_suffix(.sequence_number))]
    Timeout {
        /// Sequence number of the pending command, when the wait was for a
        /// numbered response.
        sequence_number: Option<u32>,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// The instrument explicitly reported failure in its response.
    #[error("device reported error: {0}")]
    Device(String),

    /// The exchange itself was malformed (empty command, zero timeout).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Invalid channel setup, detected at construction rather than at send
    /// time.
    #[error("invalid channel configuration: {0}")]
    Configuration(String),
}

fn pending_suffix(sequence_number: &Option<u32>) -> String {
    match sequence_number {
        Some(n) => format!(" waiting on command {n}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_pending_command() {
        let err = ChannelError::Timeout {
            sequence_number: Some(42),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("command 42"));

        let err = ChannelError::Timeout {
            sequence_number: None,
            timeout: Duration::from_secs(5),
        };
        assert!(!err.to_string().contains("command"));
    }

    #[test]
    fn io_error_preserves_source() {
        let err = ChannelError::Io {
            attempts: 3,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        };
        assert!(err.to_string().contains("3 attempt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
