//! Host channel configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChannelError;

use super::{DEFAULT_MAX_SEQUENCE_NUMBER, DEFAULT_TIMEOUT};

/// Settings for the file-based host channel.
///
/// Supplied once at construction and immutable afterwards. Loading these
/// from a file or the command line is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostChannelConfig {
    /// Directory holding the shared command/response file pair.
    pub comm_dir: PathBuf,

    /// Command file name within `comm_dir`.
    pub command_filename: String,

    /// Response file name within `comm_dir`.
    pub response_filename: String,

    /// Timeout applied by [`send`](super::HostChannel::send) callers that
    /// have no better estimate for their command.
    pub default_timeout: Duration,

    /// Pause between write retries and between response polls.
    pub retry_delay: Duration,

    /// Write attempts before giving up on the command file.
    pub max_retries: u32,

    /// Highest command number issued before the counter reset handshake.
    pub max_sequence_number: u32,

    /// Settle period after a counter reset, giving the host time to
    /// process it.
    pub reset_settle: Duration,

    /// Promote per-command traffic logs from `debug` to `info`.
    pub verbose: bool,
}

impl Default for HostChannelConfig {
    fn default() -> Self {
        Self {
            comm_dir: PathBuf::from("communication_files"),
            command_filename: "command".to_string(),
            response_filename: "response".to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            retry_delay: Duration::from_millis(100),
            max_retries: 10,
            max_sequence_number: DEFAULT_MAX_SEQUENCE_NUMBER,
            reset_settle: Duration::from_millis(500),
            verbose: false,
        }
    }
}

impl HostChannelConfig {
    /// Reject settings that would otherwise fail deep inside a send.
    pub(crate) fn validate(&self) -> Result<(), ChannelError> {
        if self.command_filename.is_empty() || self.response_filename.is_empty() {
            return Err(ChannelError::Configuration(
                "communication file names must not be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ChannelError::Configuration(
                "max_retries must be at least 1".to_string(),
            ));
        }
        // The reset handshake needs one number past the normal range.
        if self.max_sequence_number == 0 || self.max_sequence_number == u32::MAX {
            return Err(ChannelError::Configuration(format!(
                "max_sequence_number {} out of range",
                self.max_sequence_number
            )));
        }
        Ok(())
    }
}
