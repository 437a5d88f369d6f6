// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: Host bring-up daemon for the inter-core command channel
//! OWNERS: @runtime
//! STATUS: Functional
//! TEST_COVERAGE: Unit tests
//!
//! Loads an `IccConfig`, connects a local channel to a simulated remote core
//! over the loopback mailbox, completes the READY handshake and exercises
//! ping, a display command and one streamed write.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use thiserror::Error;

use tcc_ipc::host::loopback_pair;
use tcc_ipc::{
    Channel, ChannelStats, CommandHandler, ConfigError, HandlerError, IccConfig, IccDevice,
    OpenMode, OvpParams, PingInfo, PingResult, PositionParams, ResetParams,
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);
const PROBE_BYTES: &[u8] = b"tcc-ipcd";

/// Daemon failures.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Bad command line.
    #[error("usage: {0}")]
    Usage(String),
    /// Config file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Channel operation failed.
    #[error("channel: {0}")]
    Channel(#[from] tcc_ipc::Error),
    /// READY rendezvous did not complete in time.
    #[error("handshake with {0} did not complete")]
    Handshake(String),
    /// Ping test did not succeed.
    #[error("ping failed: {0:?}")]
    Ping(PingResult),
    /// Streamed bytes did not arrive intact.
    #[error("stream mismatch: sent {sent} bytes, received {received}")]
    Stream {
        /// Bytes written.
        sent: usize,
        /// Bytes read back on the remote side.
        received: usize,
    },
}

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// `--config <path>`; defaults apply when absent.
    pub config: Option<PathBuf>,
    /// `--help` was given.
    pub help: bool,
}

/// Summary of a bring-up run.
#[derive(Debug)]
pub struct Report {
    /// Channel name.
    pub name: String,
    /// Ping outcome.
    pub ping: PingInfo,
    /// Bytes streamed to the remote and read back there.
    pub streamed: usize,
    /// Local channel counters.
    pub local: ChannelStats,
    /// Remote channel counters.
    pub remote: ChannelStats,
}

/// Usage text.
pub fn help() -> &'static str {
    "tcc-ipcd brings up an inter-core command channel. Usage: tcc-ipcd [--config <path>] [--help]"
}

/// Parses arguments (without the program name).
pub fn parse_args(args: &[&str]) -> Result<Options, DaemonError> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--help" | "-h" => options.help = true,
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| DaemonError::Usage("--config needs a path".to_string()))?;
                options.config = Some(PathBuf::from(path));
            }
            other => return Err(DaemonError::Usage(format!("unknown argument {other}"))),
        }
    }
    Ok(options)
}

/// Loads the config named by `options`, or the defaults.
pub fn load_config(options: &Options) -> Result<IccConfig, DaemonError> {
    match &options.config {
        Some(path) => Ok(IccConfig::load(path)?),
        None => Ok(IccConfig::default()),
    }
}

/// Logs commands arriving from the local side.
struct RemoteCore;

impl CommandHandler for RemoteCore {
    fn on_ovp(&self, params: OvpParams) -> Result<(), HandlerError> {
        info!("remote: ovp channel {} value {}", params.channel, params.value);
        Ok(())
    }

    fn on_position(&self, params: PositionParams) -> Result<(), HandlerError> {
        info!(
            "remote: position channel {} input {} at ({}, {})",
            params.channel, params.input, params.x, params.y
        );
        Ok(())
    }

    fn on_reset(&self, params: ResetParams) -> Result<(), HandlerError> {
        info!("remote: reset block {} mode {}", params.block, params.mode);
        Ok(())
    }
}

/// Brings up a loopback channel pair and exercises it.
pub fn run(config: &IccConfig) -> Result<Report, DaemonError> {
    let (local_box, remote_box) = loopback_pair();
    let local = Channel::open(config, Arc::new(local_box), Arc::new(tcc_ipc::NoopHandler))?;
    let remote_config = IccConfig { name: format!("{}-remote", config.name), ..config.clone() };
    let remote = Channel::open(&remote_config, Arc::new(remote_box), Arc::new(RemoteCore))?;

    for channel in [&local, &remote] {
        if !channel.wait_ready(HANDSHAKE_TIMEOUT) {
            return Err(DaemonError::Handshake(channel.name().to_string()));
        }
    }
    info!("{}: ready", local.name());

    let ping = local.ping();
    if ping.result != PingResult::Success {
        return Err(DaemonError::Ping(ping.result));
    }
    info!("{}: ping ok in {:?}", local.name(), ping.elapsed);

    local.set_ovp(OvpParams { channel: 0, value: 24 })?;

    let sent = local.write(PROBE_BYTES)?;
    let file = IccDevice::new(Arc::clone(&remote), &remote_config).open(OpenMode::Blocking);
    let mut buf = vec![0u8; sent];
    let mut received = 0;
    while received < sent {
        match file.read(&mut buf[received..])? {
            0 => break,
            n => received += n,
        }
    }
    if received != sent || buf != PROBE_BYTES[..sent] {
        return Err(DaemonError::Stream { sent, received });
    }

    let report = Report {
        name: local.name().to_string(),
        ping,
        streamed: received,
        local: local.stats(),
        remote: remote.stats(),
    };
    local.close();
    remote.close();
    Ok(report)
}

/// Runs the daemon for `args` and returns the line to print.
pub fn execute(args: &[&str]) -> Result<String, DaemonError> {
    let options = parse_args(args)?;
    if options.help {
        return Ok(help().to_string());
    }
    let config = load_config(&options)?;
    let report = run(&config)?;
    Ok(format!(
        "tcc-ipcd: {} ready (ping {:?}, streamed {} bytes)",
        report.name, report.ping.elapsed, report.streamed
    ))
}
