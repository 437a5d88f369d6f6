// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transport shim over the host mailbox driver.

use std::sync::Arc;

use crate::wire::Message;

/// Receive callback invoked by the mailbox for every inbound message.
///
/// Runs in the mailbox's delivery context and must not block for an
/// unbounded time. The message is borrowed for the duration of the call.
pub type RxCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Failures reported synchronously by the mailbox send primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The mailbox queue is full.
    #[error("mailbox queue full")]
    Full,
    /// No channel is bound to this mailbox.
    #[error("mailbox not bound")]
    Unbound,
    /// A channel is already bound to this mailbox.
    #[error("mailbox already bound")]
    AlreadyBound,
    /// The remote end of the mailbox is gone.
    #[error("mailbox disconnected")]
    Disconnected,
}

/// Message-passing primitive provided by the platform.
pub trait Mailbox: Send + Sync {
    /// Binds `name` to this mailbox and registers the receive callback.
    fn bind(&self, name: &str, on_receive: RxCallback) -> Result<(), TransportError>;

    /// Drops the receive callback; later inbound messages are discarded.
    fn unbind(&self);

    /// Queues `message` for the remote core without blocking.
    fn send(&self, message: &Message) -> Result<(), TransportError>;
}
