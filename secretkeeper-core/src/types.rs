// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for identities, flags and sizes.
//!
//! Validated types check their invariants at creation time. Decoded flag
//! types keep unrecognised raw values so the state machine stays total.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Smallest slot the daemon will accept.
pub const MIN_CAPACITY: usize = 1;
/// Largest slot the daemon will accept: 1 MiB.
pub const MAX_CAPACITY: usize = 1024 * 1024;
/// Slot size used when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Raw open flag: write only.
pub const FLAG_WRITE_ONLY: u32 = 2;
/// Raw open flag: read only.
pub const FLAG_READ_ONLY: u32 = 4;
/// Raw open flag: read and write.
pub const FLAG_READ_WRITE: u32 = 6;

/// Raw transfer opcode: copy from the caller into the slot.
pub const OP_WRITE: u32 = 1;
/// Raw transfer opcode: copy from the slot to the caller.
pub const OP_READ: u32 = 2;

/// Stable identity of a caller (a Unix user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(u32);

impl CallerId {
    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    /// Get the inner uid value.
    pub const fn uid(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// Transport-level address of a caller. Only meaningful to the transport
/// and the identity resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(u64);

impl Endpoint {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep#{}", self.0)
    }
}

/// Handle number handed out by a session on a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u32);

impl HandleId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested access mode of an open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// Any flag value the driver does not understand.
    Unknown(u32),
}

impl OpenMode {
    /// Decode raw open flags.
    pub const fn from_flags(flags: u32) -> Self {
        match flags {
            FLAG_READ_ONLY => Self::ReadOnly,
            FLAG_WRITE_ONLY => Self::WriteOnly,
            FLAG_READ_WRITE => Self::ReadWrite,
            other => Self::Unknown(other),
        }
    }

    /// Raw flag value, the inverse of [`OpenMode::from_flags`].
    pub const fn flags(&self) -> u32 {
        match self {
            Self::ReadOnly => FLAG_READ_ONLY,
            Self::WriteOnly => FLAG_WRITE_ONLY,
            Self::ReadWrite => FLAG_READ_WRITE,
            Self::Unknown(flags) => *flags,
        }
    }

    /// Get the mode name for log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::WriteOnly => "WRITE_ONLY",
            Self::ReadWrite => "READ_WRITE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    /// Scatter caller bytes into the slot.
    Write,
    /// Gather slot bytes out to the caller.
    Read,
    Unknown(u32),
}

impl TransferOp {
    /// Decode a raw opcode.
    pub const fn from_code(opcode: u32) -> Self {
        match opcode {
            OP_WRITE => Self::Write,
            OP_READ => Self::Read,
            other => Self::Unknown(other),
        }
    }

    pub const fn code(&self) -> u32 {
        match self {
            Self::Write => OP_WRITE,
            Self::Read => OP_READ,
            Self::Unknown(code) => *code,
        }
    }
}

/// Validated slot capacity in bytes.
/// Must be between MIN_CAPACITY and MAX_CAPACITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Capacity(usize);

impl Capacity {
    /// Create a new Capacity with bounds validation.
    pub fn new(bytes: usize) -> Result<Self, HardValidationError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&bytes) {
            return Err(HardValidationError::CapacityOutOfBounds {
                bytes,
                min: MIN_CAPACITY,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self(bytes))
    }

    /// Get the capacity in bytes.
    pub const fn bytes(&self) -> usize {
        self.0
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl TryFrom<usize> for Capacity {
    type Error = HardValidationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for usize {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}
