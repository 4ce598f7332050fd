// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Access control state machine for the secret slot.
//!
//! Decides whether an open is legal given the slot occupancy and owner, and
//! drives Empty → Full(owner) → Empty. Close releases a handle and erases
//! the content once its one legitimate reader has let go of it.
//!
//! | state        | mode       | caller     | result                         |
//! |--------------|------------|------------|--------------------------------|
//! | any          | READ_WRITE | -          | `InvalidMode`                  |
//! | Empty        | WRITE_ONLY | U          | Full(U)                        |
//! | Empty        | READ_ONLY  | U          | no change                      |
//! | Full(U)      | READ_ONLY  | U          | Empty, pending read            |
//! | Full(U)      | READ_ONLY  | V != U     | `PermissionDenied`             |
//! | Full(U)      | WRITE_ONLY | -          | `NoSpace`                      |
//! | any          | unknown    | -          | `InvalidMode`                  |

use crate::error::{KeeperError, KeeperResult};
use crate::identity::IdentityResolver;
use crate::slot::{SecretSlot, SlotState};
use crate::types::{CallerId, Endpoint, OpenMode};

/// What a successful open did to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Empty slot claimed by a writer.
    ClaimedForWrite { owner: CallerId },
    /// Read of an empty slot; nothing to hand out.
    EmptyRead { caller: CallerId },
    /// Owner opened its full slot for reading; ownership released.
    HandedToOwner { owner: CallerId },
}

impl OpenOutcome {
    pub const fn caller(&self) -> CallerId {
        match self {
            Self::ClaimedForWrite { owner } | Self::HandedToOwner { owner } => *owner,
            Self::EmptyRead { caller } => *caller,
        }
    }
}

/// What a close did to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Handle released; content untouched.
    Released { open_count: u32 },
    /// Last handle on consumed content released; buffer zeroed.
    Erased,
}

/// Open the slot in `mode` on behalf of `endpoint`.
///
/// Read-write requests are refused before the caller is even resolved.
/// Rejected opens leave the slot, including its open count, untouched.
pub fn open<R>(
    slot: &mut SecretSlot,
    mode: OpenMode,
    endpoint: Endpoint,
    resolver: &R,
) -> KeeperResult<OpenOutcome>
where
    R: IdentityResolver + ?Sized,
{
    if mode == OpenMode::ReadWrite {
        tracing::warn!(endpoint = %endpoint, "Secret opened in READ_WRITE mode, bouncing request");
        return Err(KeeperError::InvalidMode { flags: mode.flags() });
    }

    let caller = resolver.resolve(endpoint).inspect_err(|e| {
        tracing::warn!(endpoint = %endpoint, error = %e, "Credential lookup failed");
    })?;

    let outcome = match (slot.state(), mode) {
        (SlotState::Empty, OpenMode::WriteOnly) => {
            slot.set_owner(Some(caller));
            OpenOutcome::ClaimedForWrite { owner: caller }
        }
        (SlotState::Empty, OpenMode::ReadOnly) => OpenOutcome::EmptyRead { caller },
        (SlotState::Full(owner), OpenMode::ReadOnly) if owner == caller => {
            // Ownership goes at open, not after the read completes.
            slot.set_owner(None);
            slot.mark_pending_read();
            OpenOutcome::HandedToOwner { owner }
        }
        (SlotState::Full(owner), OpenMode::ReadOnly) => {
            tracing::info!(
                caller = %caller,
                owner = %owner,
                "Refusing to read someone else's secret"
            );
            return Err(KeeperError::PermissionDenied { caller });
        }
        (SlotState::Full(_), OpenMode::WriteOnly) => {
            tracing::info!(caller = %caller, "No space left on device");
            return Err(KeeperError::NoSpace);
        }
        (state, mode) => {
            tracing::warn!(
                caller = %caller,
                state = state.name(),
                flags = mode.flags(),
                "Unknown open flags"
            );
            return Err(KeeperError::InvalidMode { flags: mode.flags() });
        }
    };

    let open_count = slot.increment_open();
    tracing::debug!(
        caller = %caller,
        mode = %mode,
        state = %slot.state(),
        open_count,
        "Secret opened"
    );

    Ok(outcome)
}

/// Release one handle on the slot.
///
/// Never fails. A close with no open handles is a transport bug; it is
/// logged and the count stays at zero.
pub fn close(slot: &mut SecretSlot) -> CloseOutcome {
    let open_count = match slot.decrement_open() {
        Some(count) => count,
        None => {
            tracing::error!("Close without a matching open; open count stays at 0");
            0
        }
    };

    tracing::debug!(open_count, "Secret handle closed");

    if open_count == 0 && slot.pending_read() {
        tracing::info!("Closed the last handle on a read secret, clearing it");
        slot.erase();
        return CloseOutcome::Erased;
    }

    CloseOutcome::Released { open_count }
}
