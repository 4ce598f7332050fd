// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The secret keeper: one slot, one identity resolver, one open counter.
//!
//! All operations take `&mut self` and run to completion. A concurrent
//! transport must put the whole keeper behind a single lock so that open,
//! close and transfer stay atomic with respect to one another.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::access::{self, CloseOutcome, OpenOutcome};
use crate::checkpoint::CheckpointStore;
use crate::error::{CheckpointError, KeeperResult};
use crate::identity::IdentityResolver;
use crate::slot::SecretSlot;
use crate::transfer;
use crate::types::{Capacity, Endpoint, OpenMode, TransferOp};

/// Checkpoint key of the open counter.
pub const OPEN_COUNTER_KEY: &str = "open_counter";

/// How the keeper process came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// First start.
    Fresh,
    /// Replacing a previous version that checkpointed its state.
    LiveUpdate,
    /// Restarted after a crash; nothing to restore.
    Restart,
}

impl InitKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fresh => "Fresh",
            Self::LiveUpdate => "LiveUpdate",
            Self::Restart => "Restart",
        }
    }
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Size advertised to the transport. Static for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub base: u64,
    pub size: u64,
}

/// Point-in-time view of the slot bookkeeping. Never includes content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMetrics {
    pub occupied: bool,
    pub open_count: u32,
    pub pending_read: bool,
    pub content_len: usize,
    pub capacity: usize,
    pub total_opens: u32,
}

/// Owner of the secret slot.
#[derive(Debug)]
pub struct SecretKeeper<R> {
    slot: SecretSlot,
    resolver: R,
    /// Successful opens since the counter was last reset.
    open_counter: u32,
}

impl<R: IdentityResolver> SecretKeeper<R> {
    /// Create a keeper with an empty slot and a zero counter.
    pub fn new(capacity: Capacity, resolver: R) -> Self {
        Self {
            slot: SecretSlot::new(capacity),
            resolver,
            open_counter: 0,
        }
    }

    /// Bring the keeper up for the given kind of start.
    ///
    /// A live update restores the open counter from `store` and removes the
    /// key. The slot always starts empty. An unreadable checkpoint only costs
    /// the counter: the keeper still comes up, counting from zero.
    pub fn start(
        kind: InitKind,
        capacity: Capacity,
        resolver: R,
        store: &dyn CheckpointStore,
    ) -> Self {
        let mut keeper = Self::new(capacity, resolver);

        match kind {
            InitKind::Fresh => {
                tracing::info!(capacity = capacity.bytes(), "Secret keeper started");
            }
            InitKind::LiveUpdate => {
                keeper.open_counter = match store.retrieve_u32(OPEN_COUNTER_KEY) {
                    Ok(counter) => counter.unwrap_or(0),
                    Err(e) => {
                        tracing::warn!(error = %e, "Checkpoint unreadable, open counter reset");
                        0
                    }
                };
                if let Err(e) = store.delete_u32(OPEN_COUNTER_KEY) {
                    tracing::warn!(error = %e, "Failed to remove checkpointed open counter");
                }
                tracing::info!(
                    open_counter = keeper.open_counter,
                    "Secret keeper live-updated, state restored"
                );
            }
            InitKind::Restart => {
                tracing::info!("Secret keeper restarted");
            }
        }

        keeper
    }

    /// Checkpoint the open counter ahead of a live update.
    pub fn save_state(&self, store: &dyn CheckpointStore) -> Result<(), CheckpointError> {
        store.publish_u32(OPEN_COUNTER_KEY, self.open_counter)
    }

    pub fn open(&mut self, mode: OpenMode, endpoint: Endpoint) -> KeeperResult<OpenOutcome> {
        let outcome = access::open(&mut self.slot, mode, endpoint, &self.resolver)?;
        self.open_counter = self.open_counter.wrapping_add(1);
        Ok(outcome)
    }

    pub fn close(&mut self) -> CloseOutcome {
        access::close(&mut self.slot)
    }

    pub fn transfer(
        &mut self,
        op: TransferOp,
        position: u64,
        regions: &mut [&mut [u8]],
    ) -> KeeperResult<usize> {
        transfer::transfer(&mut self.slot, op, position, regions)
    }

    pub fn slot(&self) -> &SecretSlot {
        &self.slot
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn open_counter(&self) -> u32 {
        self.open_counter
    }

    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry {
            base: 0,
            size: self.slot.capacity() as u64,
        }
    }

    pub fn metrics(&self) -> SlotMetrics {
        SlotMetrics {
            occupied: self.slot.owner().is_some(),
            open_count: self.slot.open_count(),
            pending_read: self.slot.pending_read(),
            content_len: self.slot.content_len(),
            capacity: self.slot.capacity(),
            total_opens: self.open_counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
    use crate::identity::PeerRegistry;
    use crate::types::CallerId;

    const ALICE: Endpoint = Endpoint::new(1);

    fn keeper() -> SecretKeeper<PeerRegistry> {
        let peers = PeerRegistry::new();
        peers.register(ALICE, CallerId::new(1000));
        SecretKeeper::new(Capacity::new(8).unwrap(), peers)
    }

    #[test]
    fn test_open_counter_counts_successes_only() {
        let mut keeper = keeper();
        keeper.open(OpenMode::WriteOnly, ALICE).unwrap();
        assert!(keeper.open(OpenMode::WriteOnly, ALICE).is_err());
        assert!(keeper.open(OpenMode::ReadWrite, ALICE).is_err());
        assert_eq!(keeper.open_counter(), 1);
    }

    #[test]
    fn test_geometry_reports_capacity() {
        let keeper = keeper();
        assert_eq!(keeper.geometry(), DeviceGeometry { base: 0, size: 8 });
    }

    #[test]
    fn test_metrics() {
        let mut keeper = keeper();
        keeper.open(OpenMode::WriteOnly, ALICE).unwrap();
        let mut data = *b"abc";
        keeper
            .transfer(TransferOp::Write, 0, &mut [&mut data[..]])
            .unwrap();

        let metrics = keeper.metrics();
        assert!(metrics.occupied);
        assert_eq!(metrics.open_count, 1);
        assert_eq!(metrics.content_len, 3);
        assert_eq!(metrics.capacity, 8);
        assert_eq!(metrics.total_opens, 1);
    }

    #[test]
    fn test_live_update_restores_counter() {
        let store = MemoryCheckpointStore::new();
        let mut old = keeper();
        old.open(OpenMode::ReadOnly, ALICE).unwrap();
        old.open(OpenMode::ReadOnly, ALICE).unwrap();
        old.save_state(&store).unwrap();

        let new = SecretKeeper::start(
            InitKind::LiveUpdate,
            Capacity::default(),
            PeerRegistry::new(),
            &store,
        );

        assert_eq!(new.open_counter(), 2);
        assert_eq!(store.retrieve_u32(OPEN_COUNTER_KEY).unwrap(), None);
        assert!(new.slot().is_zeroed());
    }

    #[test]
    fn test_fresh_and_restart_ignore_checkpoint() {
        let store = MemoryCheckpointStore::new();
        store.publish_u32(OPEN_COUNTER_KEY, 5).unwrap();

        for kind in [InitKind::Fresh, InitKind::Restart] {
            let keeper =
                SecretKeeper::start(kind, Capacity::default(), PeerRegistry::new(), &store);
            assert_eq!(keeper.open_counter(), 0);
        }
        assert_eq!(store.retrieve_u32(OPEN_COUNTER_KEY).unwrap(), Some(5));
    }

    #[test]
    fn test_live_update_survives_corrupt_checkpoint() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "not json").expect("Failed to write checkpoint");
        let store = FileCheckpointStore::new(&path);
        assert!(store.retrieve_u32(OPEN_COUNTER_KEY).is_err());

        let keeper = SecretKeeper::start(
            InitKind::LiveUpdate,
            Capacity::new(8).unwrap(),
            PeerRegistry::new(),
            &store,
        );

        assert_eq!(keeper.open_counter(), 0);
        assert_eq!(keeper.slot().state(), crate::slot::SlotState::Empty);
        assert!(keeper.slot().is_zeroed());
    }
}
