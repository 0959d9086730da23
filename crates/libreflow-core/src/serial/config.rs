//! Serial channel configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DEFAULT_BAUD_RATE;

/// Settings for the serial instrument channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialChannelConfig {
    /// Port name (e.g. "/dev/ttyUSB0" or "COM3").
    pub port_name: String,

    /// Baud rate; pump and valve hardware commonly runs at 9600.
    pub baud_rate: u32,

    /// Protocol prefix prepended to every command.
    pub prefix: String,

    /// Device address token between the prefix and the command body.
    pub address: String,

    /// Port-level read timeout, kept short so polls stay responsive.
    pub read_timeout: Duration,

    /// Pause after each write, giving the device time to act on it.
    pub post_write_delay: Duration,

    /// Pause between response-capture polls.
    pub poll_interval: Duration,

    /// Promote per-command traffic logs from `debug` to `info`.
    pub verbose: bool,
}

impl Default for SerialChannelConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            prefix: String::new(),
            address: String::new(),
            read_timeout: Duration::from_millis(300),
            post_write_delay: Duration::from_millis(200),
            poll_interval: Duration::from_millis(200),
            verbose: false,
        }
    }
}

impl SerialChannelConfig {
    /// Convenience constructor for the common case: a named port with
    /// protocol defaults.
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }
}
