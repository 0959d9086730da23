//! # LibreFlow Core Library
//!
//! Communication core for driving laboratory instruments: a
//! capillary-electrophoresis host application spoken to through a shared
//! command/response file pair, and pump/valve hardware spoken to over a
//! serial line.
//!
//! Both media offer nothing beyond plain text (no framing, no
//! multiplexing, no acknowledgment), so this crate supplies the part that
//! is genuinely hard: deciding when, and whether, the instrument has
//! answered the command you sent.
//!
//! - [`host`]: sequence-numbered command/response exchange with the host
//!   application, covering numbering and wraparound resets, write
//!   retries, response polling with stale-record rejection, and sentinel
//!   and error payload handling.
//! - [`serial`]: one-command-per-acquisition serial exchanges with
//!   busy-poll completion detection and optional response capture.
//! - [`timing`]: the deadline and retry primitives both channels share.
//!
//! ## Example
//!
//! ```rust,ignore
//! use libreflow_core::host::{HostChannel, HostChannelConfig};
//! use std::time::Duration;
//!
//! let mut host = HostChannel::connect(HostChannelConfig::default())?;
//! if let Some(path) = host.send("response$ = _METHPATH$", Duration::from_secs(5))? {
//!     println!("method directory: {path}");
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod host;
pub mod serial;
pub mod timing;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ChannelError;
    pub use crate::host::{HostChannel, HostChannelConfig, Outcome, Transport};
    pub use crate::serial::{ReadyPoll, SerialChannel, SerialChannelConfig};
    pub use crate::timing::{Clock, SystemClock};
}

pub use error::ChannelError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
