// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for secretkeeper.
//!
//! Every failure is an explicit enum variant. No `Box<dyn Error>`, no
//! `anyhow::Result` in the library.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CallerId, HandleId};

/// Top-level error type for everything around the slot: configuration,
/// checkpointing, the wire protocol and I/O.
#[derive(Debug, Error)]
pub enum SecretKeeperError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Slot Errors - Caller-Visible Result Codes
    // =========================================================================
    #[error("Request rejected: {0}")]
    Keeper(#[from] KeeperError),

    // =========================================================================
    // Checkpoint Errors - Auxiliary State Only
    // =========================================================================
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result codes surfaced to the client of an open, close or transfer.
///
/// These are the only failures the slot itself produces. None of them is
/// fatal and none of them mutates slot state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeeperError {
    #[error("Invalid open mode: {flags:#x}")]
    InvalidMode { flags: u32 },

    #[error("Permission denied: caller {caller} does not own the secret")]
    PermissionDenied { caller: CallerId },

    #[error("No space left on device: the secret is already full")]
    NoSpace,

    #[error("Credential lookup failed: {reason}")]
    CredentialLookupFailed { reason: String },

    #[error("Invalid transfer operation: {opcode}")]
    InvalidOperation { opcode: u32 },

    #[error("Handle {handle} is not open in this session")]
    HandleNotOpen { handle: HandleId },
}

impl KeeperError {
    /// Symbolic code for this error, as carried on the wire.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMode { .. } => ErrorCode::InvalidMode,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::NoSpace => ErrorCode::NoSpace,
            Self::CredentialLookupFailed { .. } => ErrorCode::CredentialLookupFailed,
            Self::InvalidOperation { .. } => ErrorCode::InvalidOperation,
            Self::HandleNotOpen { .. } => ErrorCode::HandleNotOpen,
        }
    }
}

/// Platform-independent result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Success,
    InvalidMode,
    PermissionDenied,
    NoSpace,
    CredentialLookupFailed,
    InvalidOperation,
    HandleNotOpen,
}

impl ErrorCode {
    /// Get the code name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InvalidMode => "InvalidMode",
            Self::PermissionDenied => "PermissionDenied",
            Self::NoSpace => "NoSpace",
            Self::CredentialLookupFailed => "CredentialLookupFailed",
            Self::InvalidOperation => "InvalidOperation",
            Self::HandleNotOpen => "HandleNotOpen",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hard validation errors stop the daemon before it binds its socket.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Capacity out of bounds: {bytes} bytes (min: {min}, max: {max})")]
    CapacityOutOfBounds { bytes: usize, min: usize, max: usize },
}

/// Errors reading or writing the checkpoint file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed checkpoint {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Checkpoint checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Result type alias for slot operations.
pub type KeeperResult<T> = Result<T, KeeperError>;

/// Result type alias using SecretKeeperError.
pub type SecretKeeperResult<T> = Result<T, SecretKeeperError>;
