// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: One-shot completion signal shared between a blocked caller and
//! an asynchronous receive context.
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 7 unit tests
//!
//! A [`Completion`] is created per request, fired at most once, and consumed
//! by exactly one waiter. Firing never blocks on anything but the internal
//! slot lock, so it is safe to call from a receive callback.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::time::Duration;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Deadline `timeout` from now, or `None` when it is beyond what [`Instant`]
/// can represent; callers treat `None` as an unbounded wait.
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

enum Slot<T> {
    Pending,
    Fired(T),
    Consumed,
}

/// One-shot completion carrying a value of type `T`.
pub struct Completion<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

impl<T> Completion<T> {
    /// Creates an unfired completion.
    pub fn new() -> Self {
        Self { slot: Mutex::new(Slot::Pending), cond: Condvar::new() }
    }

    /// Fires the completion with `value` and wakes the waiter.
    ///
    /// Returns `false` when the completion already fired; the first value wins.
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Fired(value);
        self.cond.notify_all();
        true
    }

    /// Returns `true` once the completion has fired (consumed or not).
    pub fn is_fired(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Pending)
    }

    /// Takes the fired value without waiting.
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        Self::take_fired(&mut slot)
    }

    /// Blocks until the completion fires or `timeout` elapses.
    ///
    /// Returns `None` on timeout or when the value was already consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = deadline_after(timeout);
        let mut slot = self.slot.lock();
        loop {
            match *slot {
                Slot::Fired(_) => return Self::take_fired(&mut slot),
                Slot::Consumed => return None,
                Slot::Pending => {}
            }
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut slot, deadline).timed_out() {
                        return Self::take_fired(&mut slot);
                    }
                }
                None => self.cond.wait(&mut slot),
            }
        }
    }

    fn take_fired(slot: &mut Slot<T>) -> Option<T> {
        match core::mem::replace(slot, Slot::Consumed) {
            Slot::Fired(value) => Some(value),
            Slot::Pending => {
                *slot = Slot::Pending;
                None
            }
            Slot::Consumed => None,
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}
