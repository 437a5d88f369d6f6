// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Mailbox message layout and frame codec
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests
//!
//! Frame layout (little-endian 32-bit words):
//!   - word 0: sequence number (0 for control messages)
//!   - word 1: `(command_code << 16) | flags`
//!   - word 2: payload length in bytes
//!   - payload bytes, at most [`MAX_PAYLOAD_BYTES`]

use core::fmt;

use bitflags::bitflags;

/// Largest payload carried by one message.
pub const MAX_PAYLOAD_BYTES: usize = 512;

/// First command code outside the defined set.
pub const CODE_LIMIT: u16 = 9;

const HEADER_BYTES: usize = 12;

/// Command codes understood by both cores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    /// No command; ignored on receipt.
    Null = 0,
    /// Overlay priority.
    Ovp = 1,
    /// Input position.
    Position = 2,
    /// Block reset.
    Reset = 3,
    /// Rendezvous handshake.
    Ready = 4,
    /// Liveness probe.
    Status = 5,
    /// Streaming payload bytes.
    Write = 6,
    /// Round-trip probe.
    Ping = 7,
    /// Teardown notice.
    Close = 8,
}

impl CommandCode {
    /// Decodes a raw code; `None` for codes at or beyond [`CODE_LIMIT`].
    pub const fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0 => Self::Null,
            1 => Self::Ovp,
            2 => Self::Position,
            3 => Self::Reset,
            4 => Self::Ready,
            5 => Self::Status,
            6 => Self::Write,
            7 => Self::Ping,
            8 => Self::Close,
            _ => return None,
        })
    }

    /// Returns `true` for codes that are sequence-stamped and acknowledged.
    pub const fn is_command(self) -> bool {
        matches!(self, Self::Ovp | Self::Position | Self::Reset | Self::Write | Self::Ping)
    }
}

bitflags! {
    /// Flag bits packed into the low half of word 1.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// Reply to a previously sent message.
        const ACK = 1 << 0;
        /// Reply to a STATUS probe.
        const STATUS = 1 << 1;
    }
}

/// Frame decode failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Frame shorter than the fixed header.
    #[error("frame truncated: {len} bytes")]
    Truncated {
        /// Received frame length.
        len: usize,
    },
    /// Payload larger than [`MAX_PAYLOAD_BYTES`].
    #[error("payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Offending payload length.
        len: usize,
    },
    /// Declared payload length disagrees with the frame.
    #[error("payload length mismatch: declared {declared}, carried {actual}")]
    LengthMismatch {
        /// Length stored in word 2.
        declared: usize,
        /// Bytes actually following the header.
        actual: usize,
    },
    /// Command payload lacks required words.
    #[error("{code:?} needs {need} payload words, got {have}")]
    MissingWords {
        /// Command being decoded.
        code: CommandCode,
        /// Words required.
        need: usize,
        /// Words present.
        have: usize,
    },
    /// Code does not describe a command.
    #[error("code {0:#x} is not a command")]
    NotACommand(u16),
}

/// Fixed-capacity payload storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    len: usize,
    bytes: [u8; MAX_PAYLOAD_BYTES],
}

impl Payload {
    /// Empty payload.
    pub const EMPTY: Self = Self { len: 0, bytes: [0u8; MAX_PAYLOAD_BYTES] };

    /// Copies `bytes` into a payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(WireError::PayloadTooLarge { len: bytes.len() });
        }
        let mut payload = Self::EMPTY;
        payload.bytes[..bytes.len()].copy_from_slice(bytes);
        payload.len = bytes.len();
        Ok(payload)
    }

    /// Packs `words` little-endian.
    pub fn from_words(words: &[u32]) -> Result<Self, WireError> {
        let len = words.len() * 4;
        if len > MAX_PAYLOAD_BYTES {
            return Err(WireError::PayloadTooLarge { len });
        }
        let mut payload = Self::EMPTY;
        for (chunk, word) in payload.bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        payload.len = len;
        Ok(payload)
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole words carried.
    pub fn word_count(&self) -> usize {
        self.len / 4
    }

    /// Reads word `index`, if fully present.
    pub fn word(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let end = start.checked_add(4)?;
        if end > self.len {
            return None;
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[start..end]);
        Some(u32::from_le_bytes(raw))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("len", &self.len).finish()
    }
}

/// Unit exchanged over the mailbox.
///
/// Fields are private; a message is built once and never changed after it is
/// handed to the transport. Replies are fresh messages built with
/// [`Message::reply`].
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    sequence: u32,
    code: u16,
    flags: Flags,
    payload: Payload,
}

impl Message {
    /// Builds an unstamped message.
    pub fn new(code: CommandCode, flags: Flags, payload: Payload) -> Self {
        Self { sequence: 0, code: code as u16, flags, payload }
    }

    /// Control message without payload or sequence (READY/STATUS/CLOSE).
    pub fn control(code: CommandCode) -> Self {
        Self::new(code, Flags::empty(), Payload::EMPTY)
    }

    /// Builds a message from raw header fields, as seen on the wire.
    pub fn from_parts(sequence: u32, code: u16, flags: Flags, payload: Payload) -> Self {
        Self { sequence, code, flags, payload }
    }

    /// Reply to `inbound`: same sequence and code, `flags` set, no payload.
    pub fn reply(inbound: &Message, flags: Flags) -> Self {
        Self { sequence: inbound.sequence, code: inbound.code, flags, payload: Payload::EMPTY }
    }

    /// Returns this message stamped with `sequence`.
    pub fn stamped(self, sequence: u32) -> Self {
        Self { sequence, ..self }
    }

    /// Returns this message with `flags` replacing its flag bits.
    pub fn with_flags(self, flags: Flags) -> Self {
        Self { flags, ..self }
    }

    /// Sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Decoded command code; `None` when out of range.
    pub fn code(&self) -> Option<CommandCode> {
        CommandCode::from_raw(self.code)
    }

    /// Raw command code.
    pub fn raw_code(&self) -> u16 {
        self.code
    }

    /// Flag bits.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Returns `true` when the ACK flag is set.
    pub fn is_ack(&self) -> bool {
        self.flags.contains(Flags::ACK)
    }

    /// Payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Encodes the message into a mailbox frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_BYTES + self.payload.len());
        frame.extend_from_slice(&self.sequence.to_le_bytes());
        let packed = (u32::from(self.code) << 16) | u32::from(self.flags.bits());
        frame.extend_from_slice(&packed.to_le_bytes());
        frame.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(self.payload.as_bytes());
        frame
    }

    /// Decodes a mailbox frame.
    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < HEADER_BYTES {
            return Err(WireError::Truncated { len: frame.len() });
        }
        let word = |i: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&frame[i * 4..i * 4 + 4]);
            u32::from_le_bytes(raw)
        };
        let sequence = word(0);
        let packed = word(1);
        let declared = word(2) as usize;
        if declared > MAX_PAYLOAD_BYTES {
            return Err(WireError::PayloadTooLarge { len: declared });
        }
        let body = &frame[HEADER_BYTES..];
        if body.len() != declared {
            return Err(WireError::LengthMismatch { declared, actual: body.len() });
        }
        Ok(Self {
            sequence,
            code: (packed >> 16) as u16,
            flags: Flags::from_bits_retain(packed as u16),
            payload: Payload::from_bytes(body)?,
        })
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("sequence", &self.sequence)
            .field("code", &self.code())
            .field("flags", &self.flags)
            .field("len", &self.payload.len())
            .finish()
    }
}
