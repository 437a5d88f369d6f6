// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Inter-core command channel (ICC) over a shared mailbox
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests per module + tests/icc_e2e
//!
//! PUBLIC API:
//!   - Channel: one mailbox-backed link to a remote core (open/close/status)
//!   - Channel::send_and_wait(): blocking command issue with ACK timeout
//!   - CommandHandler: local effects of commands issued by the remote core
//!   - IccDevice / IccFile: character-device style read/write/ioctl surface
//!   - Mailbox: transport shim implemented by the host mailbox driver
//!   - IccConfig: TOML configuration
//!
//! DEPENDENCIES:
//!   - parking_lot: rx/tx lock domains and condition variables
//!   - tcc-sync: per-request one-shot completion
//!   - ringbuf: receive ring buffer storage
//!   - log: diagnostics
//!
//! The channel is driven from two sides: caller threads issuing commands and
//! the mailbox receive callback delivering remote messages. Locally issued
//! commands are serialized under the tx lock, so at most one request waits
//! for an acknowledgment per channel.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::time::Duration;

mod channel;
mod command;
mod config;
mod device;
mod dispatch;
mod engine;
mod ring;
mod seq;
mod transport;
mod wire;

#[cfg(feature = "backend-host")]
pub mod host;

pub use channel::{Channel, ChannelStats, PingInfo, PingResult};
pub use command::{Command, OvpParams, PositionParams, ResetParams};
pub use config::{ConfigError, IccConfig, ReadParams};
pub use device::{ioctl_nr, IccDevice, IccFile, Ioctl, IoctlReply, OpenMode};
pub use dispatch::{ChannelState, CommandHandler, HandlerError, NoopHandler};
pub use seq::{match_ack, RxSequence, TxSequence};
pub use transport::{Mailbox, RxCallback, TransportError};
pub use wire::{CommandCode, Flags, Message, Payload, WireError, CODE_LIMIT, MAX_PAYLOAD_BYTES};

/// Result type returned by channel operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Behaviour of a bounded wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Return immediately if no progress can be made.
    NonBlocking,
    /// Block until either the operation completes or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    /// Returns `true` when the caller requested a non-blocking attempt.
    pub const fn is_non_blocking(self) -> bool {
        matches!(self, Self::NonBlocking)
    }
}

/// Errors surfaced to local callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed local request.
    #[error("invalid argument")]
    InvalidArgument,
    /// The READY handshake has not completed.
    #[error("channel not ready")]
    NotReady,
    /// No matching acknowledgment arrived before the deadline.
    #[error("timed out waiting for acknowledgment")]
    TimedOut,
    /// The mailbox send primitive failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The channel was torn down while the request was in flight.
    #[error("channel closed")]
    Closed,
    /// Non-blocking read found no data.
    #[error("operation would block")]
    WouldBlock,
    /// The outbound sequence space is used up; reopen the channel.
    #[error("outbound sequence space exhausted")]
    SequenceExhausted,
}

impl Error {
    /// Negative Linux errno reported by the device surface.
    pub fn as_errno(&self) -> i32 {
        match self {
            Error::InvalidArgument => -22,                   // EINVAL
            Error::NotReady => -16,                          // EBUSY
            Error::TimedOut => -110,                         // ETIMEDOUT
            Error::Transport(TransportError::Full) => -12,   // ENOMEM
            Error::Transport(_) => -5,                       // EIO
            Error::Closed => -19,                            // ENODEV
            Error::WouldBlock => -11,                        // EAGAIN
            Error::SequenceExhausted => -75,                 // EOVERFLOW
        }
    }
}
