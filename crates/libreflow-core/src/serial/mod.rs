//! Serial instrument channel
//!
//! Line-oriented command protocol for syringe pumps, valve selectors, and
//! similar RS-232/USB bench hardware. Commands are framed as
//! `"<prefix><address><text>\r"`; responses, when an instrument gives
//! any, are its raw buffered bytes. Completion of long-running operations
//! is detected by busy-polling a status query until a ready marker shows
//! up in the reply; see [`ReadyPoll`].

mod channel;
mod config;
pub mod port;

pub use channel::{ReadyPoll, SerialChannel};
pub use config::SerialChannelConfig;
pub use port::{clear_buffers, open_port, SerialIo};

/// Default baud rate for pump and valve hardware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
