//! Shared-medium transport
//!
//! The correlation engine needs exactly two capabilities from its medium:
//! overwrite it with a command record, and snapshot whatever the host has
//! most recently written back. Keeping that surface narrow lets tests
//! drive the engine with an in-memory double and keeps the matching and
//! timeout logic independent of the filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ChannelError;

/// Byte-level access to a command/response medium.
pub trait Transport {
    /// Replace the command medium's content with `bytes`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Snapshot the response medium.
    ///
    /// `None` means nothing is available yet. Transient read failures are
    /// also reported as `None`: the host holds the file open mid-write, so
    /// an unreadable medium is indistinguishable from a pending one.
    fn try_read(&mut self) -> Option<Vec<u8>>;
}

/// The command/response file pair polled by the host application's monitor
/// macro.
///
/// The files are deliberately never locked. Each command fully overwrites
/// the command file; the monitor reads it on its own cadence and fully
/// overwrites the response file in turn.
#[derive(Debug)]
pub struct CommandFiles {
    command_path: PathBuf,
    response_path: PathBuf,
}

impl CommandFiles {
    /// Set up the communication directory, creating it and touching both
    /// files so the monitor finds them on its next pass.
    pub fn create(
        comm_dir: &Path,
        command_filename: &str,
        response_filename: &str,
    ) -> Result<Self, ChannelError> {
        fs::create_dir_all(comm_dir).map_err(|err| {
            ChannelError::Configuration(format!(
                "cannot create communication directory {}: {err}",
                comm_dir.display()
            ))
        })?;

        let command_path = comm_dir.join(command_filename);
        let response_path = comm_dir.join(response_filename);
        for path in [&command_path, &response_path] {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| {
                    ChannelError::Configuration(format!(
                        "cannot initialize communication file {}: {err}",
                        path.display()
                    ))
                })?;
        }

        Ok(Self {
            command_path,
            response_path,
        })
    }

    /// Path of the command file.
    pub fn command_path(&self) -> &Path {
        &self.command_path
    }

    /// Path of the response file.
    pub fn response_path(&self) -> &Path {
        &self.response_path
    }
}

impl Transport for CommandFiles {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(&self.command_path)?;
        file.write_all(bytes)?;
        // The monitor may poll between our write and close; make the
        // content durable before reporting success.
        file.sync_all()
    }

    fn try_read(&mut self) -> Option<Vec<u8>> {
        match fs::read(&self.response_path) {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(bytes),
            Err(_) => None,
        }
    }
}
