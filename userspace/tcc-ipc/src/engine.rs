// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Blocking send-and-wait for locally issued commands
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Internal
//! TEST_COVERAGE: Unit tests
//!
//! The tx lock is held for the full stamp/send/wait cycle, so at most one
//! request per channel is pending. The pending slot has its own small lock;
//! the receive path resolves it without touching the tx lock.

use core::time::Duration;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tcc_sync::Completion;

use crate::seq::{match_ack, TxSequence};
use crate::transport::Mailbox;
use crate::wire::Message;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Acked,
    Aborted,
}

struct Pending {
    sequence: u32,
    done: Arc<Completion<Outcome>>,
}

#[derive(Default)]
struct PendingSlot {
    current: Option<Pending>,
    shut_down: bool,
}

pub(crate) struct Engine {
    tx: Mutex<TxSequence>,
    pending: Mutex<PendingSlot>,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Self { tx: Mutex::new(TxSequence::new()), pending: Mutex::new(PendingSlot::default()) }
    }

    /// Stamps `message`, sends it and waits for the matching ACK.
    ///
    /// Returns the sequence number the command was sent with.
    pub(crate) fn send_and_wait(
        &self,
        mailbox: &dyn Mailbox,
        message: Message,
        timeout: Duration,
    ) -> Result<u32> {
        let mut tx = self.tx.lock();
        let sequence = tx.stamp()?;
        let message = message.stamped(sequence);

        let done = Arc::new(Completion::new());
        {
            let mut slot = self.pending.lock();
            if slot.shut_down {
                return Err(Error::Closed);
            }
            slot.current = Some(Pending { sequence, done: Arc::clone(&done) });
        }

        if let Err(err) = mailbox.send(&message) {
            warn!("seq {sequence}: send failed: {err}");
            self.clear(sequence);
            return Err(Error::Transport(err));
        }

        let outcome = done.wait_timeout(timeout);
        self.clear(sequence);
        drop(tx);

        match outcome {
            Some(Outcome::Acked) => Ok(sequence),
            Some(Outcome::Aborted) => Err(Error::Closed),
            None => {
                debug!("seq {sequence}: no ack within {timeout:?}");
                Err(Error::TimedOut)
            }
        }
    }

    /// Satisfies the pending request if `sequence` matches it.
    pub(crate) fn resolve(&self, sequence: u32) -> bool {
        let slot = self.pending.lock();
        match slot.current.as_ref() {
            Some(pending) if match_ack(sequence, pending.sequence) => {
                pending.done.complete(Outcome::Acked)
            }
            _ => false,
        }
    }

    /// Fails any pending request and refuses new ones.
    pub(crate) fn shut_down(&self) -> bool {
        let mut slot = self.pending.lock();
        slot.shut_down = true;
        match slot.current.take() {
            Some(pending) => pending.done.complete(Outcome::Aborted),
            None => false,
        }
    }

    /// Sequence currently awaiting an ACK, if any.
    #[cfg(test)]
    pub(crate) fn pending_sequence(&self) -> Option<u32> {
        self.pending.lock().current.as_ref().map(|p| p.sequence)
    }

    fn clear(&self, sequence: u32) {
        let mut slot = self.pending.lock();
        if slot.current.as_ref().is_some_and(|p| p.sequence == sequence) {
            slot.current = None;
        }
    }
}
