//! File-based host channel
//!
//! Implements the numbered command/response exchange with the host control
//! application:
//!
//! ```text
//! LibreFlow ←→ command/response files ←→ host monitor macro ←→ command processor
//! ```
//!
//! Commands are written to the command file as `"<number> <text>"`; the
//! host's monitor macro polls that file, executes the command, and writes
//! `"<number> <result>"` to the response file. The number is the only
//! correlation mechanism the medium offers, and [`HostChannel`] owns all
//! the logic built on it: numbering and wraparound, write retries,
//! response polling and stale-record rejection, sentinel and error payload
//! handling.

mod config;
mod engine;
pub mod transport;
mod wire;

pub use config::HostChannelConfig;
pub use engine::{HostChannel, RESET_COMMAND};
pub use transport::{CommandFiles, Transport};
pub use wire::{Outcome, DEVICE_ERROR_PREFIX, NO_VALUE_SENTINEL};

use std::time::Duration;

/// Default timeout for host commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default highest command number before the counter reset handshake.
pub const DEFAULT_MAX_SEQUENCE_NUMBER: u32 = 256;
