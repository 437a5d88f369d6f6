// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Receive ring buffer for streamed payload bytes
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Internal
//! TEST_COVERAGE: Unit tests
//!
//! The receive callback is the only writer and never blocks: a payload that
//! does not fit is dropped whole. Readers are serialized by their own lock and
//! wait on a condition variable that the writer signals after every append.
//! A non-blocking reader never queues behind a parked one.

use parking_lot::{Condvar, Mutex};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use tcc_sync::deadline_after;

use crate::{Error, Result, Wait};

pub(crate) struct RxRing {
    buf: Mutex<HeapRb<u8>>,
    readable: Condvar,
    readers: Mutex<()>,
}

impl RxRing {
    /// `capacity` must be nonzero; the config layer enforces it.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(HeapRb::new(capacity.max(1))),
            readable: Condvar::new(),
            readers: Mutex::new(()),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.lock().capacity().get()
    }

    pub(crate) fn available(&self) -> usize {
        self.buf.lock().occupied_len()
    }

    /// Appends `bytes` if they fit entirely; returns the number dropped.
    pub(crate) fn push(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let mut buf = self.buf.lock();
        if buf.vacant_len() < bytes.len() {
            return bytes.len();
        }
        let pushed = buf.push_slice(bytes);
        drop(buf);
        self.readable.notify_all();
        bytes.len() - pushed
    }

    /// Copies up to `out.len()` bytes.
    ///
    /// Non-blocking reads fail with [`Error::WouldBlock`] when empty or when
    /// another reader holds the ring. Timed reads wait until `min` bytes
    /// (clamped to `1..=out.len()`) are buffered or the timeout elapses, then
    /// return whatever is available.
    pub(crate) fn read(&self, out: &mut [u8], min: usize, wait: Wait) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match wait {
            Wait::NonBlocking => {
                let _reader = self.readers.try_lock().ok_or(Error::WouldBlock)?;
                let mut buf = self.buf.lock();
                if buf.is_empty() {
                    return Err(Error::WouldBlock);
                }
                Ok(buf.pop_slice(out))
            }
            Wait::Timeout(timeout) => {
                let _reader = self.readers.lock();
                let mut buf = self.buf.lock();
                let want = min.clamp(1, out.len());
                let deadline = deadline_after(timeout);
                while buf.occupied_len() < want {
                    match deadline {
                        Some(deadline) => {
                            if self.readable.wait_until(&mut buf, deadline).timed_out() {
                                break;
                            }
                        }
                        None => self.readable.wait(&mut buf),
                    }
                }
                Ok(buf.pop_slice(out))
            }
        }
    }

    /// Discards buffered bytes; returns how many were dropped.
    pub(crate) fn flush(&self) -> usize {
        self.buf.lock().clear()
    }
}
