// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Channel configuration loaded from TOML.
//!
//! ```toml
//! name = "cam-ipc"
//! ack_timeout_ms = 100
//! ring_capacity = 4096
//! max_write_size = 512
//! read_timeout_ms = 1000
//!
//! [read]
//! vmin = 1
//! vtime = 5
//! ```

use core::time::Duration;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::wire::MAX_PAYLOAD_BYTES;

/// Termios-style blocking parameters for reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadParams {
    /// Minimum bytes a blocking read waits for.
    pub vmin: u32,
    /// Read timeout in tenths of a second; 0 selects `read_timeout_ms`.
    pub vtime: u32,
}

/// Configuration of one channel.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IccConfig {
    /// Mailbox name the channel binds to.
    pub name: String,
    /// How long a command waits for its acknowledgment.
    pub ack_timeout_ms: u64,
    /// Receive ring buffer size in bytes.
    pub ring_capacity: usize,
    /// Largest chunk a single write sends.
    pub max_write_size: usize,
    /// Bound for blocking reads when `read.vtime` is 0.
    pub read_timeout_ms: u64,
    /// Initial read parameters.
    pub read: ReadParams,
}

impl Default for IccConfig {
    fn default() -> Self {
        Self {
            name: "tcc-ipc".to_string(),
            ack_timeout_ms: 100,
            ring_capacity: 4096,
            max_write_size: MAX_PAYLOAD_BYTES,
            read_timeout_ms: 1000,
            read: ReadParams::default(),
        }
    }
}

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The TOML did not match the schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("{field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl IccConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.name.is_empty() {
            return invalid("name", "must not be empty");
        }
        // The ack wait runs with the tx lock held; keep it sub-second.
        if self.ack_timeout_ms == 0 || self.ack_timeout_ms >= 1000 {
            return invalid("ack_timeout_ms", "must be within 1..1000");
        }
        if self.ring_capacity == 0 {
            return invalid("ring_capacity", "must be nonzero");
        }
        if self.max_write_size == 0 || self.max_write_size > MAX_PAYLOAD_BYTES {
            return invalid("max_write_size", "must be within 1..=512");
        }
        if self.read_timeout_ms == 0 {
            return invalid("read_timeout_ms", "must be nonzero");
        }
        Ok(())
    }

    /// ACK wait bound.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Fallback bound for blocking reads.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
