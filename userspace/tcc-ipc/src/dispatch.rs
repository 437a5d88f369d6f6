// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Inbound message classification and channel state machine
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests (RecordingMailbox)
//!
//! STATE MACHINE:
//!   - Uninitialized: channel closed, every inbound message is ignored
//!   - Init: bound to the mailbox, waiting for the READY rendezvous
//!   - Ready: commands flow in both directions
//!
//! INBOUND RULES:
//!   - READY (Init/Ready): become Ready; reply READY|ACK unless it is an ACK
//!   - STATUS (Ready): reply STATUS|ACK unless it is itself a reply
//!   - CLOSE (Init/Ready): remote went away, fall back to Init, no reply
//!   - commands (Ready): ACKs resolve the pending request; fresh commands
//!     are validated, handled, committed and acknowledged under the rx lock
//!   - NULL / unknown codes: logged and dropped, no reply
//!
//! Handler failures never affect the protocol: the command is still
//! committed and acknowledged.

use std::sync::atomic::Ordering;

use log::{debug, info, warn};

use crate::channel::Channel;
use crate::command::{Command, OvpParams, PositionParams, ResetParams};
use crate::wire::{CommandCode, Flags, Message};

/// Lifecycle state of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Closed or not yet bound.
    Uninitialized,
    /// Bound, handshake pending.
    Init,
    /// Handshake complete.
    Ready,
}

/// Failure reported by a command handler; logged, never surfaced to the remote.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Streamed payload did not fit in the receive buffer.
    #[error("receive buffer full, dropped {dropped} bytes")]
    RingFull {
        /// Bytes discarded.
        dropped: usize,
    },
    /// Hardware or driver specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Local effects of commands issued by the remote core.
///
/// Each method runs in the receive context under the rx lock and must return
/// promptly.
pub trait CommandHandler: Send + Sync {
    /// Apply an overlay priority.
    fn on_ovp(&self, params: OvpParams) -> Result<(), HandlerError> {
        let _ = params;
        Ok(())
    }

    /// Move a mixer input.
    fn on_position(&self, params: PositionParams) -> Result<(), HandlerError> {
        let _ = params;
        Ok(())
    }

    /// Reset a hardware block.
    fn on_reset(&self, params: ResetParams) -> Result<(), HandlerError> {
        let _ = params;
        Ok(())
    }
}

/// Handler that accepts every command without side effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl CommandHandler for NoopHandler {}

impl Channel {
    /// Entry point for the mailbox receive callback.
    pub(crate) fn dispatch(&self, message: &Message) {
        let Some(code) = message.code() else {
            self.stats.unknown_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("{}: dropping unknown command code {:#x}", self.name, message.raw_code());
            return;
        };
        match code {
            CommandCode::Null => {
                self.stats.unknown_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("{}: ignoring NULL command", self.name);
            }
            CommandCode::Ready => self.on_ready(message),
            CommandCode::Status => self.on_status(message),
            CommandCode::Close => self.on_close(),
            CommandCode::Ovp
            | CommandCode::Position
            | CommandCode::Reset
            | CommandCode::Write
            | CommandCode::Ping => self.on_command(code, message),
        }
    }

    fn on_ready(&self, message: &Message) {
        let mut rx = self.rx.lock();
        if rx.state == ChannelState::Uninitialized {
            debug!("{}: READY on closed channel ignored", self.name);
            return;
        }
        let was = rx.state;
        rx.state = ChannelState::Ready;
        self.ready.notify_all();
        if was != ChannelState::Ready {
            info!("{}: handshake complete", self.name);
        }
        if message.is_ack() {
            return;
        }
        // A fresh READY means the remote (re)opened; its counter restarted.
        rx.sequence.reset();
        self.reply(message, Flags::ACK);
    }

    fn on_status(&self, message: &Message) {
        let rx = self.rx.lock();
        if rx.state != ChannelState::Ready {
            debug!("{}: STATUS before handshake ignored", self.name);
            return;
        }
        if message.is_ack() || message.flags().contains(Flags::STATUS) {
            debug!("{}: status reply received", self.name);
            return;
        }
        self.reply(message, Flags::ACK | Flags::STATUS);
    }

    fn on_close(&self) {
        let mut rx = self.rx.lock();
        if rx.state == ChannelState::Ready {
            info!("{}: remote closed, awaiting new handshake", self.name);
            rx.state = ChannelState::Init;
        }
    }

    fn on_command(&self, code: CommandCode, message: &Message) {
        let mut rx = self.rx.lock();
        if rx.state != ChannelState::Ready {
            debug!("{}: {code:?} before handshake dropped", self.name);
            return;
        }
        let sequence = message.sequence();
        if message.is_ack() {
            drop(rx);
            if !self.engine.resolve(sequence) {
                debug!("{}: unmatched ack for seq {sequence}", self.name);
            }
            return;
        }
        if !rx.sequence.accept(sequence) {
            self.stats.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                "{}: stale or duplicate {code:?} seq {sequence} (last {})",
                self.name,
                rx.sequence.last()
            );
            return;
        }
        match Command::parse(message) {
            Ok(command) => {
                if let Err(err) = self.execute(&command) {
                    warn!("{}: {code:?} seq {sequence} handler failed: {err}", self.name);
                }
            }
            Err(err) => warn!("{}: malformed {code:?} seq {sequence}: {err}", self.name),
        }
        rx.sequence.commit(sequence);
        self.stats.commands_handled.fetch_add(1, Ordering::Relaxed);
        self.reply(message, Flags::ACK);
    }

    fn execute(&self, command: &Command<'_>) -> Result<(), HandlerError> {
        match *command {
            Command::Ovp(params) => self.handler.on_ovp(params),
            Command::Position(params) => self.handler.on_position(params),
            Command::Reset(params) => self.handler.on_reset(params),
            Command::Write(bytes) => match self.ring.push(bytes) {
                0 => Ok(()),
                dropped => {
                    self.stats.ring_bytes_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
                    Err(HandlerError::RingFull { dropped })
                }
            },
            Command::Ping => Ok(()),
        }
    }

    fn reply(&self, inbound: &Message, flags: Flags) {
        let reply = Message::reply(inbound, flags);
        match self.mailbox.send(&reply) {
            Ok(()) => {
                self.stats.replies_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => warn!("{}: reply to seq {} failed: {err}", self.name, inbound.sequence()),
        }
    }
}
