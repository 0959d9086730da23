//! Host Channel Probe Tool
//!
//! A standalone tool to check that the host application's monitor macro is
//! running and answering, and optionally run a single command through it.
//!
//! Usage:
//!   cargo run --example host_probe -- [OPTIONS] [COMMAND]
//!
//! Options:
//!   --dir PATH        Communication directory (default: communication_files)
//!   --timeout MS      Response timeout in ms (default: 5000)
//!   --verbose         Log every command/response exchanged

use libreflow_core::host::{HostChannel, HostChannelConfig};
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut config = HostChannelConfig::default();
    let mut timeout_ms = 5000u64;
    let mut command: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" | "-d" => {
                i += 1;
                if i < args.len() {
                    config.comm_dir = PathBuf::from(&args[i]);
                }
            }
            "--timeout" | "-t" => {
                i += 1;
                if i < args.len() {
                    timeout_ms = args[i].parse().unwrap_or(5000);
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            other => {
                command = Some(other.to_string());
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let timeout = Duration::from_millis(timeout_ms);
    println!("Communication directory: {}", config.comm_dir.display());

    let mut channel = match HostChannel::connect(config) {
        Ok(channel) => channel,
        Err(err) => {
            eprintln!("Failed to set up channel: {err}");
            std::process::exit(1);
        }
    };

    print!("Probing host connection... ");
    if channel.verify_connection(timeout) {
        println!("OK");
    } else {
        println!("no answer");
        eprintln!("Ensure the host application is running and its monitor macro is loaded.");
        std::process::exit(1);
    }

    if let Some(command) = command {
        match channel.send(&command, timeout) {
            Ok(Some(response)) => println!("Response: {response}"),
            Ok(None) => println!("Command executed (no value returned)"),
            Err(err) => {
                eprintln!("Command failed: {err}");
                std::process::exit(1);
            }
        }
    }
}
