// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Channel lifecycle and typed command API
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests + tests/icc_e2e
//!
//! PUBLIC API:
//!   - Channel::open(): bind the mailbox, send the first READY
//!   - Channel::close(): best-effort CLOSE, unbind, fail the pending request
//!   - Channel::query_status() / wait_ready(): readiness with lazy re-probe
//!   - Channel::send_and_wait(): stamped command with ACK timeout
//!   - set_ovp / set_position / set_reset / write / ping: typed commands
//!
//! LOCK DOMAINS:
//!   - tx (inside Engine): sequence stamping and the send/wait cycle
//!   - rx: state machine and rx sequence; never held across a wait except
//!     the bounded readiness wait, which releases it while parked

use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use tcc_sync::deadline_after;

use crate::command::{Command, OvpParams, PositionParams, ResetParams};
use crate::config::IccConfig;
use crate::dispatch::{ChannelState, CommandHandler};
use crate::engine::Engine;
use crate::ring::RxRing;
use crate::seq::RxSequence;
use crate::transport::{Mailbox, RxCallback};
use crate::wire::{CommandCode, Message};
use crate::{Error, Result, Wait};

const REPROBE_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) struct RxState {
    pub(crate) state: ChannelState,
    pub(crate) sequence: RxSequence,
}

#[derive(Default)]
pub(crate) struct Stats {
    pub(crate) commands_handled: AtomicU64,
    pub(crate) duplicates_dropped: AtomicU64,
    pub(crate) unknown_dropped: AtomicU64,
    pub(crate) replies_sent: AtomicU64,
    pub(crate) ring_bytes_dropped: AtomicU64,
}

/// Snapshot of channel counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Remote commands handled and acknowledged.
    pub commands_handled: u64,
    /// Remote commands rejected as stale or duplicate.
    pub duplicates_dropped: u64,
    /// NULL or out-of-range codes dropped.
    pub unknown_dropped: u64,
    /// Replies (ACK / STATUS) sent.
    pub replies_sent: u64,
    /// Streamed bytes dropped because the ring was full.
    pub ring_bytes_dropped: u64,
}

/// Outcome of a ping test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingResult {
    /// The remote acknowledged the ping.
    Success,
    /// Handshake not complete.
    NotReady,
    /// The mailbox refused the message.
    SendFailed,
    /// No acknowledgment before the deadline.
    NoResponse,
}

impl PingResult {
    /// Numeric result code reported to user space.
    pub const fn code(self) -> u32 {
        match self {
            PingResult::Success => 0,
            PingResult::NotReady => 1,
            PingResult::SendFailed => 2,
            PingResult::NoResponse => 3,
        }
    }
}

/// Result and round-trip time of a ping test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingInfo {
    /// Outcome.
    pub result: PingResult,
    /// Time from send to ACK (or failure).
    pub elapsed: Duration,
}

/// One mailbox-backed link to a remote core.
pub struct Channel {
    pub(crate) name: String,
    pub(crate) mailbox: Arc<dyn Mailbox>,
    pub(crate) handler: Arc<dyn CommandHandler>,
    pub(crate) rx: Mutex<RxState>,
    pub(crate) ready: Condvar,
    pub(crate) engine: Engine,
    pub(crate) ring: RxRing,
    pub(crate) stats: Stats,
    ack_timeout: Duration,
    max_write_size: usize,
}

impl Channel {
    /// Binds `mailbox`, enters INIT and sends the first READY.
    ///
    /// Does not wait for the handshake; see [`Channel::wait_ready`]. A config
    /// that fails [`IccConfig::validate`] is rejected with
    /// [`Error::InvalidArgument`] before the mailbox is touched.
    pub fn open(
        config: &IccConfig,
        mailbox: Arc<dyn Mailbox>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(|err| {
            warn!("{}: rejected config: {err}", config.name);
            Error::InvalidArgument
        })?;
        let channel = Arc::new(Self {
            name: config.name.clone(),
            mailbox,
            handler,
            rx: Mutex::new(RxState {
                state: ChannelState::Uninitialized,
                sequence: RxSequence::new(),
            }),
            ready: Condvar::new(),
            engine: Engine::new(),
            ring: RxRing::with_capacity(config.ring_capacity),
            stats: Stats::default(),
            ack_timeout: config.ack_timeout(),
            max_write_size: config.max_write_size,
        });

        let weak = Arc::downgrade(&channel);
        let on_receive: RxCallback = Arc::new(move |message: &Message| {
            if let Some(channel) = weak.upgrade() {
                channel.dispatch(message);
            }
        });
        channel.mailbox.bind(&channel.name, on_receive)?;

        channel.rx.lock().state = ChannelState::Init;
        info!("{}: opened", channel.name);
        channel.send_control(CommandCode::Ready);
        Ok(channel)
    }

    /// Tears the channel down; idempotent.
    pub fn close(&self) {
        {
            let mut rx = self.rx.lock();
            if rx.state == ChannelState::Uninitialized {
                return;
            }
            rx.state = ChannelState::Uninitialized;
            self.ready.notify_all();
        }
        self.send_control(CommandCode::Close);
        self.mailbox.unbind();
        if self.engine.shut_down() {
            debug!("{}: pending request failed by close", self.name);
        }
        info!("{}: closed", self.name);
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.rx.lock().state
    }

    /// Last committed remote sequence.
    pub fn last_rx_sequence(&self) -> u32 {
        self.rx.lock().sequence.last()
    }

    /// Returns `true` when READY; otherwise re-sends a READY probe.
    ///
    /// The probe goes out under the rx lock so it can never trail a
    /// transition to READY.
    pub fn query_status(&self) -> bool {
        let rx = self.rx.lock();
        match rx.state {
            ChannelState::Ready => true,
            ChannelState::Init => {
                self.send_control(CommandCode::Ready);
                false
            }
            ChannelState::Uninitialized => false,
        }
    }

    /// Waits up to `timeout` for the handshake, re-probing periodically.
    ///
    /// A timeout too large to express as a deadline waits indefinitely.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        let mut rx = self.rx.lock();
        loop {
            match rx.state {
                ChannelState::Ready => return true,
                ChannelState::Uninitialized => return false,
                ChannelState::Init => {}
            }
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return false;
            }
            self.send_control(CommandCode::Ready);
            let next_probe = now + REPROBE_INTERVAL;
            let slice = deadline.map_or(next_probe, |deadline| next_probe.min(deadline));
            self.ready.wait_until(&mut rx, slice);
        }
    }

    /// Sends a STATUS liveness probe to the remote core.
    pub fn probe_status(&self) -> Result<()> {
        self.ensure_ready()?;
        self.mailbox.send(&Message::control(CommandCode::Status))?;
        Ok(())
    }

    /// Sends a command message and blocks until it is acknowledged.
    ///
    /// `message` must carry a command code; it is stamped with a fresh
    /// sequence number, which is returned on success.
    pub fn send_and_wait(&self, message: Message, timeout: Duration) -> Result<u32> {
        match message.code() {
            Some(code) if code.is_command() => {}
            _ => return Err(Error::InvalidArgument),
        }
        if message.is_ack() {
            return Err(Error::InvalidArgument);
        }
        self.ensure_ready()?;
        self.engine.send_and_wait(&*self.mailbox, message, timeout)
    }

    /// Issues `command` with the configured ACK timeout.
    pub fn send_command(&self, command: &Command<'_>) -> Result<u32> {
        let message = command.to_message().map_err(|_| Error::InvalidArgument)?;
        self.send_and_wait(message, self.ack_timeout)
    }

    /// Sets the overlay priority on the remote side.
    pub fn set_ovp(&self, params: OvpParams) -> Result<()> {
        self.send_command(&Command::Ovp(params)).map(drop)
    }

    /// Moves a mixer input on the remote side.
    pub fn set_position(&self, params: PositionParams) -> Result<()> {
        self.send_command(&Command::Position(params)).map(drop)
    }

    /// Resets a block on the remote side.
    pub fn set_reset(&self, params: ResetParams) -> Result<()> {
        self.send_command(&Command::Reset(params)).map(drop)
    }

    /// Streams up to `max_write_size` bytes; returns the count sent.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let len = bytes.len().min(self.max_write_size);
        self.send_command(&Command::Write(&bytes[..len]))?;
        Ok(len)
    }

    /// Round-trip probe.
    pub fn ping(&self) -> PingInfo {
        let start = Instant::now();
        let result = match self.send_command(&Command::Ping) {
            Ok(_) => PingResult::Success,
            Err(Error::NotReady) => PingResult::NotReady,
            Err(Error::TimedOut) => PingResult::NoResponse,
            Err(err) => {
                debug!("{}: ping failed: {err}", self.name);
                PingResult::SendFailed
            }
        };
        PingInfo { result, elapsed: start.elapsed() }
    }

    /// Reads streamed bytes received from the remote core.
    pub fn read(&self, out: &mut [u8], min: usize, wait: Wait) -> Result<usize> {
        self.ensure_ready()?;
        self.ring.read(out, min, wait)
    }

    /// Bytes waiting in the receive buffer.
    pub fn readable(&self) -> usize {
        self.ring.available()
    }

    /// Discards buffered receive bytes.
    pub fn flush(&self) -> usize {
        self.ring.flush()
    }

    /// Receive buffer size.
    pub fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Largest single write.
    pub fn max_write_size(&self) -> usize {
        self.max_write_size
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ChannelStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ChannelStats {
            commands_handled: load(&self.stats.commands_handled),
            duplicates_dropped: load(&self.stats.duplicates_dropped),
            unknown_dropped: load(&self.stats.unknown_dropped),
            replies_sent: load(&self.stats.replies_sent),
            ring_bytes_dropped: load(&self.stats.ring_bytes_dropped),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ChannelState::Ready => Ok(()),
            ChannelState::Init => Err(Error::NotReady),
            ChannelState::Uninitialized => Err(Error::Closed),
        }
    }

    fn send_control(&self, code: CommandCode) {
        if let Err(err) = self.mailbox.send(&Message::control(code)) {
            warn!("{}: {code:?} not sent: {err}", self.name);
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
