// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Character-device style surface over a channel
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests + tests/icc_e2e
//!
//! PUBLIC API:
//!   - IccDevice::open(mode): per-open file handle
//!   - IccFile::read / write: streamed bytes through the receive ring and WRITE
//!   - IccFile::ioctl / ioctl_raw: typed and raw request decoding
//!
//! Blocking reads follow termios VMIN/VTIME: wait for `vmin` bytes for at most
//! `vtime` tenths of a second (or `read_timeout_ms` when `vtime` is 0) and
//! return a short count at the deadline. Non-blocking reads fail with
//! `WouldBlock` when the ring is empty.

use core::time::Duration;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::channel::{Channel, PingInfo};
use crate::command::{OvpParams, PositionParams, ResetParams};
use crate::config::{IccConfig, ReadParams};
use crate::{Error, Result, Wait};

/// Raw ioctl request numbers: `(b'I' << 8) | n`.
pub mod ioctl_nr {
    const MAGIC: u32 = b'I' as u32;

    const fn nr(n: u32) -> u32 {
        (MAGIC << 8) | n
    }

    /// args: `[vmin, vtime]`
    pub const SET_PARAM: u32 = nr(1);
    /// no args
    pub const GET_PARAM: u32 = nr(2);
    /// no args
    pub const FLUSH: u32 = nr(3);
    /// no args
    pub const PING_TEST: u32 = nr(4);
    /// no args
    pub const IS_READY: u32 = nr(5);
    /// args: `[channel, value]`
    pub const SET_OVP: u32 = nr(6);
    /// args: `[channel, input, x, y]`
    pub const SET_POS: u32 = nr(7);
    /// args: `[block, mode]`
    pub const SET_RESET: u32 = nr(8);
}

/// How a file handle treats empty reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads wait per the current read parameters.
    Blocking,
    /// Reads fail with [`Error::WouldBlock`] when nothing is buffered.
    NonBlocking,
}

/// Decoded ioctl request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ioctl {
    /// Replace the read parameters.
    SetParam(ReadParams),
    /// Report the read parameters.
    GetParam,
    /// Discard buffered receive bytes.
    Flush,
    /// Round-trip probe.
    PingTest,
    /// Readiness query; re-probes the remote when not ready.
    IsReady,
    /// Overlay priority command.
    SetOvp(OvpParams),
    /// Mixer position command.
    SetPos(PositionParams),
    /// Block reset command.
    SetReset(ResetParams),
}

impl Ioctl {
    /// Decodes a raw request number and its argument words.
    pub fn decode(nr: u32, args: &[u32]) -> Result<Self> {
        let arg = |i: usize| args.get(i).copied().ok_or(Error::InvalidArgument);
        let request = match nr {
            ioctl_nr::SET_PARAM => Ioctl::SetParam(ReadParams { vmin: arg(0)?, vtime: arg(1)? }),
            ioctl_nr::GET_PARAM => Ioctl::GetParam,
            ioctl_nr::FLUSH => Ioctl::Flush,
            ioctl_nr::PING_TEST => Ioctl::PingTest,
            ioctl_nr::IS_READY => Ioctl::IsReady,
            ioctl_nr::SET_OVP => Ioctl::SetOvp(OvpParams { channel: arg(0)?, value: arg(1)? }),
            ioctl_nr::SET_POS => Ioctl::SetPos(PositionParams {
                channel: arg(0)?,
                input: arg(1)?,
                x: arg(2)?,
                y: arg(3)?,
            }),
            ioctl_nr::SET_RESET => Ioctl::SetReset(ResetParams { block: arg(0)?, mode: arg(1)? }),
            _ => return Err(Error::InvalidArgument),
        };
        Ok(request)
    }
}

/// Result of a successful ioctl.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoctlReply {
    /// Command acknowledged or parameters stored.
    Done,
    /// Current read parameters.
    Param(ReadParams),
    /// Number of bytes discarded.
    Flushed(usize),
    /// Ping outcome.
    Ping(PingInfo),
    /// Whether the handshake is complete.
    Ready(bool),
}

/// Device node backed by one channel.
pub struct IccDevice {
    channel: Arc<Channel>,
    params: Mutex<ReadParams>,
    read_timeout: Duration,
}

impl IccDevice {
    /// Wraps `channel` with the read parameters from `config`.
    pub fn new(channel: Arc<Channel>, config: &IccConfig) -> Arc<Self> {
        Arc::new(Self {
            channel,
            params: Mutex::new(config.read),
            read_timeout: config.read_timeout(),
        })
    }

    /// Opens a file handle.
    pub fn open(self: &Arc<Self>, mode: OpenMode) -> IccFile {
        IccFile { device: Arc::clone(self), mode }
    }

    /// Underlying channel.
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    fn read_wait(&self) -> (usize, Wait) {
        let params = *self.params.lock();
        let timeout = match params.vtime {
            0 => self.read_timeout,
            tenths => Duration::from_millis(u64::from(tenths) * 100),
        };
        (params.vmin as usize, Wait::Timeout(timeout))
    }
}

/// Open file handle on an [`IccDevice`].
pub struct IccFile {
    device: Arc<IccDevice>,
    mode: OpenMode,
}

impl IccFile {
    /// Open mode.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Reads streamed bytes; `Ok(0)` means a blocking read hit its deadline.
    pub fn read(&self, out: &mut [u8]) -> Result<usize> {
        let (min, wait) = match self.mode {
            OpenMode::NonBlocking => (1, Wait::NonBlocking),
            OpenMode::Blocking => self.device.read_wait(),
        };
        self.device.channel.read(out, min, wait)
    }

    /// Sends up to `max_write_size` bytes; returns the count accepted.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.device.channel.write(bytes)
    }

    /// `true` when a read would not block.
    pub fn poll(&self) -> bool {
        self.device.channel.readable() > 0
    }

    /// Executes a decoded request.
    pub fn ioctl(&self, request: Ioctl) -> Result<IoctlReply> {
        let channel = &self.device.channel;
        let reply = match request {
            Ioctl::SetParam(params) => {
                *self.device.params.lock() = params;
                IoctlReply::Done
            }
            Ioctl::GetParam => IoctlReply::Param(*self.device.params.lock()),
            Ioctl::Flush => IoctlReply::Flushed(channel.flush()),
            Ioctl::PingTest => IoctlReply::Ping(channel.ping()),
            Ioctl::IsReady => IoctlReply::Ready(channel.query_status()),
            Ioctl::SetOvp(params) => channel.set_ovp(params).map(|()| IoctlReply::Done)?,
            Ioctl::SetPos(params) => channel.set_position(params).map(|()| IoctlReply::Done)?,
            Ioctl::SetReset(params) => channel.set_reset(params).map(|()| IoctlReply::Done)?,
        };
        Ok(reply)
    }

    /// Decodes and executes a raw request.
    pub fn ioctl_raw(&self, nr: u32, args: &[u32]) -> Result<IoctlReply> {
        let request = Ioctl::decode(nr, args).inspect_err(|_| {
            debug!("{}: bad ioctl {nr:#x}", self.device.channel.name());
        })?;
        self.ioctl(request)
    }
}
