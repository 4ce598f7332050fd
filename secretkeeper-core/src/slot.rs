// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The single fixed-capacity secret slot.
//!
//! Cycles empty → owned-for-write → full → owned-for-read → empty and is
//! never destroyed. Bytes are wiped with `zeroize` so the erase cannot be
//! optimised away.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::types::{CallerId, Capacity};

/// Occupancy of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    /// No owner: available to a new writer.
    Empty,
    /// Holds (or is receiving) the owner's content.
    Full(CallerId),
}

impl SlotState {
    /// Get the state name for log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Full(_) => "Full",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Full(owner) => write!(f, "Full({})", owner),
        }
    }
}

/// The secret slot and its bookkeeping.
pub struct SecretSlot {
    buffer: Vec<u8>,
    owner: Option<CallerId>,
    open_count: u32,
    pending_read: bool,
    /// High-water mark of bytes written since the last erase.
    content_len: usize,
}

impl SecretSlot {
    /// Create an empty, zero-filled slot.
    pub fn new(capacity: Capacity) -> Self {
        Self {
            buffer: vec![0u8; capacity.bytes()],
            owner: None,
            open_count: 0,
            pending_read: false,
            content_len: 0,
        }
    }

    pub fn state(&self) -> SlotState {
        match self.owner {
            Some(owner) => SlotState::Full(owner),
            None => SlotState::Empty,
        }
    }

    pub fn owner(&self) -> Option<CallerId> {
        self.owner
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn pending_read(&self) -> bool {
        self.pending_read
    }

    pub fn content_len(&self) -> usize {
        self.content_len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Raw view of the whole buffer, including bytes past the content.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// True when every byte of the buffer is zero.
    pub fn is_zeroed(&self) -> bool {
        self.buffer.iter().all(|&b| b == 0)
    }

    pub(crate) fn set_owner(&mut self, owner: Option<CallerId>) {
        self.owner = owner;
    }

    pub(crate) fn mark_pending_read(&mut self) {
        self.pending_read = true;
    }

    pub(crate) fn increment_open(&mut self) -> u32 {
        self.open_count += 1;
        self.open_count
    }

    /// Decrement the open count. Returns `None` if it was already zero.
    pub(crate) fn decrement_open(&mut self) -> Option<u32> {
        self.open_count = self.open_count.checked_sub(1)?;
        Some(self.open_count)
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub(crate) fn extend_content(&mut self, end: usize) {
        self.content_len = self.content_len.max(end.min(self.buffer.len()));
    }

    /// Zero the buffer and forget the pending read.
    pub(crate) fn erase(&mut self) {
        // Zeroize the slice, not the Vec: the Vec impl also truncates it.
        self.buffer.as_mut_slice().zeroize();
        self.content_len = 0;
        self.pending_read = false;
    }
}

impl Drop for SecretSlot {
    fn drop(&mut self) {
        self.buffer.as_mut_slice().zeroize();
    }
}

impl fmt::Debug for SecretSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSlot")
            .field("buffer", &"[REDACTED]")
            .field("capacity", &self.buffer.len())
            .field("owner", &self.owner)
            .field("open_count", &self.open_count)
            .field("pending_read", &self.pending_read)
            .field("content_len", &self.content_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(bytes: usize) -> SecretSlot {
        SecretSlot::new(Capacity::new(bytes).unwrap())
    }

    #[test]
    fn test_new_slot_is_empty() {
        let slot = slot(16);
        assert_eq!(slot.state(), SlotState::Empty);
        assert_eq!(slot.open_count(), 0);
        assert!(!slot.pending_read());
        assert_eq!(slot.capacity(), 16);
        assert!(slot.is_zeroed());
    }

    #[test]
    fn test_erase_keeps_capacity() {
        let mut slot = slot(8);
        slot.buffer_mut()[..3].copy_from_slice(b"abc");
        slot.extend_content(3);
        slot.mark_pending_read();

        slot.erase();

        assert_eq!(slot.capacity(), 8);
        assert!(slot.is_zeroed());
        assert_eq!(slot.content_len(), 0);
        assert!(!slot.pending_read());
    }

    #[test]
    fn test_decrement_open_never_underflows() {
        let mut slot = slot(8);
        assert_eq!(slot.decrement_open(), None);
        assert_eq!(slot.open_count(), 0);

        slot.increment_open();
        assert_eq!(slot.decrement_open(), Some(0));
    }

    #[test]
    fn test_debug_redacts_buffer() {
        let mut slot = slot(8);
        slot.buffer_mut()[..6].copy_from_slice(b"hunter");
        let debug = format!("{:?}", slot);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter"));
    }
}
