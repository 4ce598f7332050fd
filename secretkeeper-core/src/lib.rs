// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Secretkeeper Core Library
//!
//! A single-slot secret mailbox: one client writes a secret, only that same
//! client can read it back, and the slot is wiped once the reader lets go.
//! Provides the access control state machine, the transfer engine, identity
//! resolution, checkpointing, configuration parsing and the wire protocol.

pub mod access;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod identity;
pub mod keeper;
pub mod protocol;
pub mod session;
pub mod slot;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use access::{CloseOutcome, OpenOutcome};
pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{Config, ConfigLoader};
pub use error::{
    CheckpointError, ErrorCode, HardValidationError, KeeperError, KeeperResult, SecretKeeperError,
    SecretKeeperResult,
};
pub use identity::{IdentityResolver, PeerRegistry};
pub use keeper::{DeviceGeometry, InitKind, SecretKeeper, SlotMetrics};
pub use protocol::{Request, Response};
pub use session::Session;
pub use slot::{SecretSlot, SlotState};
pub use types::{CallerId, Capacity, Endpoint, HandleId, OpenMode, TransferOp};
