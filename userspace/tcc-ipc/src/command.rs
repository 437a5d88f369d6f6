// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed view of command payloads.

use crate::wire::{CommandCode, Flags, Message, Payload, WireError};

/// Overlay priority for a display channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OvpParams {
    /// Display channel.
    pub channel: u32,
    /// Overlay priority value.
    pub value: u32,
}

/// Position of one mixer input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionParams {
    /// Display channel.
    pub channel: u32,
    /// Mixer input index.
    pub input: u32,
    /// Horizontal offset.
    pub x: u32,
    /// Vertical offset.
    pub y: u32,
}

/// Reset request for one hardware block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetParams {
    /// Block number.
    pub block: u32,
    /// Reset mode.
    pub mode: u32,
}

/// Command carried by a stamped, acknowledged message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Set overlay priority.
    Ovp(OvpParams),
    /// Move a mixer input.
    Position(PositionParams),
    /// Reset a block.
    Reset(ResetParams),
    /// Stream bytes into the remote receive buffer.
    Write(&'a [u8]),
    /// Round-trip probe.
    Ping,
}

impl<'a> Command<'a> {
    /// Command code used on the wire.
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Ovp(_) => CommandCode::Ovp,
            Command::Position(_) => CommandCode::Position,
            Command::Reset(_) => CommandCode::Reset,
            Command::Write(_) => CommandCode::Write,
            Command::Ping => CommandCode::Ping,
        }
    }

    /// Builds the unstamped outbound message.
    pub fn to_message(&self) -> Result<Message, WireError> {
        let payload = match *self {
            Command::Ovp(p) => Payload::from_words(&[p.channel, p.value])?,
            Command::Position(p) => Payload::from_words(&[p.channel, p.input, p.x, p.y])?,
            Command::Reset(p) => Payload::from_words(&[p.block, p.mode])?,
            Command::Write(bytes) => Payload::from_bytes(bytes)?,
            Command::Ping => Payload::EMPTY,
        };
        Ok(Message::new(self.code(), Flags::empty(), payload))
    }

    /// Decodes the command carried by `message`, borrowing its payload.
    pub fn parse(message: &'a Message) -> Result<Self, WireError> {
        let code = message
            .code()
            .filter(|code| code.is_command())
            .ok_or(WireError::NotACommand(message.raw_code()))?;
        let payload = message.payload();
        let words = |need: usize| -> Result<[u32; 4], WireError> {
            let have = payload.word_count();
            if have < need {
                return Err(WireError::MissingWords { code, need, have });
            }
            let mut out = [0u32; 4];
            for (i, slot) in out.iter_mut().enumerate().take(need) {
                *slot = payload.word(i).unwrap_or_default();
            }
            Ok(out)
        };
        Ok(match code {
            CommandCode::Ovp => {
                let w = words(2)?;
                Command::Ovp(OvpParams { channel: w[0], value: w[1] })
            }
            CommandCode::Position => {
                let w = words(4)?;
                Command::Position(PositionParams { channel: w[0], input: w[1], x: w[2], y: w[3] })
            }
            CommandCode::Reset => {
                let w = words(2)?;
                Command::Reset(ResetParams { block: w[0], mode: w[1] })
            }
            CommandCode::Write => Command::Write(payload.as_bytes()),
            CommandCode::Ping => Command::Ping,
            other => return Err(WireError::NotACommand(other as u16)),
        })
    }
}
