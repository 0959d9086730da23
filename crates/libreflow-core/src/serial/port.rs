//! Serial port handling
//!
//! Low-level access for pump and valve hardware. Ports are opened for the
//! duration of a single command exchange and configured to the standard
//! 8N1 framing these instruments use.

use std::io;
use std::time::Duration;

use serialport::SerialPort;

use crate::error::ChannelError;

/// Open and configure a port for one command exchange.
pub fn open_port(
    name: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<Box<dyn SerialPort>, ChannelError> {
    let mut port = serialport::new(name, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|err| ChannelError::Io {
            attempts: 1,
            source: io::Error::from(err),
        })?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// Standard 8N1 configuration, no flow control.
fn configure_port(port: &mut dyn SerialPort) -> Result<(), ChannelError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .and_then(|()| port.set_parity(serialport::Parity::None))
        .and_then(|()| port.set_stop_bits(serialport::StopBits::One))
        .and_then(|()| port.set_flow_control(serialport::FlowControl::None))
        .map_err(|err| ChannelError::Io {
            attempts: 1,
            source: io::Error::from(err),
        })
}

/// Drop anything buffered from a previous exchange.
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ChannelError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|err| ChannelError::Io {
            attempts: 1,
            source: io::Error::from(err),
        })
}

/// Capabilities the command loop needs from the wire.
///
/// [`Box<dyn SerialPort>`] is the production implementation; tests drive
/// the loop with an in-memory double.
pub trait SerialIo: io::Read + io::Write {
    /// Bytes currently buffered on the receive side.
    fn bytes_to_read(&self) -> io::Result<u32>;
}

impl SerialIo for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> io::Result<u32> {
        SerialPort::bytes_to_read(self.as_ref()).map_err(io::Error::from)
    }
}
