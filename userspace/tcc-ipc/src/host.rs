// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-process mailbox emulation for host-based testing
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - loopback_pair(): two connected mailboxes, one per simulated core
//!   - struct LoopbackMailbox: bounded queue + delivery thread per endpoint
//!   - struct RecordingMailbox: synchronous mailbox that records sends
//!
//! INVARIANTS:
//!   - Frames cross the loopback encoded, so every delivery exercises the codec
//!   - Delivery preserves send order within one direction
//!   - The receive callback runs on the endpoint's delivery thread, never on
//!     the sender's thread
//!   - Frames arriving while no channel is bound are discarded
//!
//! ERROR CONDITIONS:
//!   - TransportError::Full: peer queue at capacity
//!   - TransportError::Disconnected: peer endpoint dropped
//!   - TransportError::AlreadyBound: second bind without unbind
//!   - TransportError::Unbound: send from an endpoint nothing is bound to
//!
//! FAULT INJECTION:
//!   - set_drop_outbound(): frames are accepted but lost (missing ACKs)
//!   - set_send_failure(): send fails synchronously
//!   - inject(): deliver a raw message as if the peer had sent it

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::transport::{Mailbox, RxCallback, TransportError};
use crate::wire::Message;

/// Frames queued per direction before `send` reports [`TransportError::Full`].
pub const LOOPBACK_DEPTH: usize = 64;

/// Most recent outbound messages kept per endpoint for [`LoopbackMailbox::sent`].
pub const SENT_HISTORY: usize = 1024;

type Binding = Arc<Mutex<Option<(String, RxCallback)>>>;

/// Creates two connected mailboxes backed by bounded in-memory queues.
pub fn loopback_pair() -> (LoopbackMailbox, LoopbackMailbox) {
    let (a_tx, a_rx) = mpsc::sync_channel::<Vec<u8>>(LOOPBACK_DEPTH);
    let (b_tx, b_rx) = mpsc::sync_channel::<Vec<u8>>(LOOPBACK_DEPTH);
    let a = LoopbackMailbox::new("a", b_tx.clone(), a_tx.clone(), a_rx);
    let b = LoopbackMailbox::new("b", a_tx, b_tx, b_rx);
    (a, b)
}

/// One endpoint of a loopback mailbox pair.
pub struct LoopbackMailbox {
    label: &'static str,
    peer: SyncSender<Vec<u8>>,
    inbox: SyncSender<Vec<u8>>,
    binding: Binding,
    drop_outbound: AtomicBool,
    send_failure: Mutex<Option<TransportError>>,
    outbound: Mutex<VecDeque<Message>>,
}

impl LoopbackMailbox {
    fn new(
        label: &'static str,
        peer: SyncSender<Vec<u8>>,
        inbox: SyncSender<Vec<u8>>,
        inbox_rx: Receiver<Vec<u8>>,
    ) -> Self {
        let binding: Binding = Arc::new(Mutex::new(None));
        let delivery = Arc::clone(&binding);
        thread::spawn(move || deliver(label, inbox_rx, delivery));
        Self {
            label,
            peer,
            inbox,
            binding,
            drop_outbound: AtomicBool::new(false),
            send_failure: Mutex::new(None),
            outbound: Mutex::new(VecDeque::with_capacity(SENT_HISTORY)),
        }
    }

    /// Accepts outbound frames without delivering them while `enabled`.
    pub fn set_drop_outbound(&self, enabled: bool) {
        self.drop_outbound.store(enabled, Ordering::SeqCst);
    }

    /// Makes every `send` fail with `failure` until cleared.
    pub fn set_send_failure(&self, failure: Option<TransportError>) {
        *self.send_failure.lock() = failure;
    }

    /// Queues `message` on this endpoint's own inbox, as if the peer sent it.
    pub fn inject(&self, message: &Message) -> Result<(), TransportError> {
        push(&self.inbox, message.encode())
    }

    /// The last [`SENT_HISTORY`] messages accepted by `send`, oldest first.
    pub fn sent(&self) -> Vec<Message> {
        self.outbound.lock().iter().cloned().collect()
    }

    /// Name of the bound channel, if any.
    pub fn bound_name(&self) -> Option<String> {
        self.binding.lock().as_ref().map(|(name, _)| name.clone())
    }
}

impl Mailbox for LoopbackMailbox {
    fn bind(&self, name: &str, on_receive: RxCallback) -> Result<(), TransportError> {
        let mut binding = self.binding.lock();
        if binding.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        debug!("loopback {}: bound to {name}", self.label);
        *binding = Some((name.to_string(), on_receive));
        Ok(())
    }

    fn unbind(&self) {
        self.binding.lock().take();
    }

    fn send(&self, message: &Message) -> Result<(), TransportError> {
        if let Some(failure) = *self.send_failure.lock() {
            return Err(failure);
        }
        if self.binding.lock().is_none() {
            return Err(TransportError::Unbound);
        }
        if !self.drop_outbound.load(Ordering::SeqCst) {
            push(&self.peer, message.encode())?;
        }
        let mut outbound = self.outbound.lock();
        if outbound.len() == SENT_HISTORY {
            outbound.pop_front();
        }
        outbound.push_back(message.clone());
        Ok(())
    }
}

fn push(queue: &SyncSender<Vec<u8>>, frame: Vec<u8>) -> Result<(), TransportError> {
    queue.try_send(frame).map_err(|err| match err {
        TrySendError::Full(_) => TransportError::Full,
        TrySendError::Disconnected(_) => TransportError::Disconnected,
    })
}

fn deliver(label: &'static str, inbox: Receiver<Vec<u8>>, binding: Binding) {
    while let Ok(frame) = inbox.recv() {
        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                warn!("loopback {label}: undecodable frame: {err}");
                continue;
            }
        };
        let callback = binding.lock().as_ref().map(|(_, callback)| Arc::clone(callback));
        match callback {
            Some(callback) => callback(&message),
            None => debug!("loopback {label}: nothing bound, dropping {message:?}"),
        }
    }
}

/// Synchronous mailbox that records sends and delivers on demand.
#[derive(Default)]
pub struct RecordingMailbox {
    binding: Mutex<Option<(String, RxCallback)>>,
    sent: Mutex<Vec<Message>>,
    send_failure: Mutex<Option<TransportError>>,
}

impl RecordingMailbox {
    /// Creates an unbound mailbox.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs the bound callback on the calling thread; `false` if unbound.
    pub fn deliver(&self, message: &Message) -> bool {
        let callback = self.binding.lock().as_ref().map(|(_, callback)| Arc::clone(callback));
        match callback {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Messages sent so far, clearing the record.
    pub fn take_sent(&self) -> Vec<Message> {
        core::mem::take(&mut *self.sent.lock())
    }

    /// Makes every `send` fail with `failure` until cleared.
    pub fn set_send_failure(&self, failure: Option<TransportError>) {
        *self.send_failure.lock() = failure;
    }

    /// Name of the bound channel, if any.
    pub fn bound_name(&self) -> Option<String> {
        self.binding.lock().as_ref().map(|(name, _)| name.clone())
    }
}

impl Mailbox for RecordingMailbox {
    fn bind(&self, name: &str, on_receive: RxCallback) -> Result<(), TransportError> {
        let mut binding = self.binding.lock();
        if binding.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        *binding = Some((name.to_string(), on_receive));
        Ok(())
    }

    fn unbind(&self) {
        self.binding.lock().take();
    }

    fn send(&self, message: &Message) -> Result<(), TransportError> {
        if let Some(failure) = *self.send_failure.lock() {
            return Err(failure);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
