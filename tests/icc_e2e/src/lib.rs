// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Shared fixtures for channel end-to-end tests over the loopback mailbox.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tcc_ipc::host::{loopback_pair, LoopbackMailbox};
use tcc_ipc::{
    Channel, CommandHandler, HandlerError, IccConfig, OvpParams, PositionParams, ResetParams,
};

/// Generous bound for anything that should happen "soon".
pub const SETTLE: Duration = Duration::from_secs(2);

/// Command observed by a [`RecordingHandler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seen {
    /// OVP command.
    Ovp(OvpParams),
    /// POSITION command.
    Position(PositionParams),
    /// RESET command.
    Reset(ResetParams),
}

/// Handler that records every command and can be told to fail.
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<Seen>>,
    fail: Mutex<bool>,
}

impl RecordingHandler {
    /// Commands seen so far, in arrival order.
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    /// Makes subsequent commands report a handler failure.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    fn record(&self, seen: Seen) -> Result<(), HandlerError> {
        self.seen.lock().push(seen);
        if *self.fail.lock() {
            return Err(HandlerError::Failed("injected".to_string()));
        }
        Ok(())
    }
}

impl CommandHandler for RecordingHandler {
    fn on_ovp(&self, params: OvpParams) -> Result<(), HandlerError> {
        self.record(Seen::Ovp(params))
    }

    fn on_position(&self, params: PositionParams) -> Result<(), HandlerError> {
        self.record(Seen::Position(params))
    }

    fn on_reset(&self, params: ResetParams) -> Result<(), HandlerError> {
        self.record(Seen::Reset(params))
    }
}

/// Two channels joined by a loopback mailbox pair.
pub struct Pair {
    /// Channel under test.
    pub local: Arc<Channel>,
    /// Simulated remote core.
    pub remote: Arc<Channel>,
    /// Mailbox behind `local`.
    pub local_box: Arc<LoopbackMailbox>,
    /// Mailbox behind `remote`.
    pub remote_box: Arc<LoopbackMailbox>,
    /// Handler of `local`.
    pub local_handler: Arc<RecordingHandler>,
    /// Handler of `remote`.
    pub remote_handler: Arc<RecordingHandler>,
}

/// Opens both ends without waiting for the handshake.
pub fn open_pair(local: &IccConfig, remote: &IccConfig) -> Pair {
    let (a, b) = loopback_pair();
    let local_box = Arc::new(a);
    let remote_box = Arc::new(b);
    let local_handler = Arc::new(RecordingHandler::default());
    let remote_handler = Arc::new(RecordingHandler::default());
    let local_channel =
        Channel::open(local, local_box.clone(), local_handler.clone()).expect("open local");
    let remote_channel =
        Channel::open(remote, remote_box.clone(), remote_handler.clone()).expect("open remote");
    Pair {
        local: local_channel,
        remote: remote_channel,
        local_box,
        remote_box,
        local_handler,
        remote_handler,
    }
}

/// Opens both ends with default configs and completes the handshake.
pub fn ready_pair() -> Pair {
    let remote = IccConfig { name: "remote".to_string(), ..IccConfig::default() };
    ready_pair_with(&IccConfig::default(), &remote)
}

/// Like [`ready_pair`] with explicit configs.
pub fn ready_pair_with(local: &IccConfig, remote: &IccConfig) -> Pair {
    let pair = open_pair(local, remote);
    assert!(pair.local.wait_ready(SETTLE), "local handshake");
    assert!(pair.remote.wait_ready(SETTLE), "remote handshake");
    pair
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
