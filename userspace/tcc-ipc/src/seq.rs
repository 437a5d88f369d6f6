// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-direction sequence bookkeeping
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit + property tests
//!
//! Sequence 0 means "unassigned": it is never stamped on a command and a
//! fresh receive side (last seen 0) accepts any nonzero sequence. Sequences
//! do not wrap; a channel that exhausts `u32` must be reopened.

use crate::{Error, Result};

/// Outbound counter, owned by the local side and guarded by the tx lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxSequence {
    last: u32,
}

impl TxSequence {
    /// Fresh counter; the first stamp returns 1.
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Increments the counter and returns the new value.
    pub fn stamp(&mut self) -> Result<u32> {
        let next = self.last.checked_add(1).ok_or(Error::SequenceExhausted)?;
        self.last = next;
        Ok(next)
    }

    /// Last stamped value (0 if none).
    pub const fn last(&self) -> u32 {
        self.last
    }
}

/// Last accepted remote sequence, guarded by the rx lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxSequence {
    last: u32,
}

impl RxSequence {
    /// Fresh receive side with no history.
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Returns `true` if a command stamped `remote` has not been handled yet.
    ///
    /// Does not record `remote`; call [`RxSequence::commit`] once the command
    /// has been handled and is about to be acknowledged.
    pub const fn accept(&self, remote: u32) -> bool {
        if remote == 0 {
            return false;
        }
        !(self.last > 0 && self.last >= remote)
    }

    /// Records `remote` as handled.
    pub fn commit(&mut self, remote: u32) {
        self.last = remote;
    }

    /// Forgets history after the remote side restarted.
    pub fn reset(&mut self) {
        self.last = 0;
    }

    /// Last committed value (0 if none).
    pub const fn last(&self) -> u32 {
        self.last
    }
}

/// Exact ACK correlation; there is no window.
pub const fn match_ack(received: u32, pending: u32) -> bool {
    received == pending
}
