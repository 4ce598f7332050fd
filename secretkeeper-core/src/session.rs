// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-connection handle bookkeeping.
//!
//! The keeper only counts handles. A session remembers which handles its
//! client actually holds, so a close or transfer on a handle that was never
//! opened is refused, and a client that disconnects with handles still
//! open gets them closed on its behalf.

use std::collections::BTreeMap;

use crate::access::CloseOutcome;
use crate::error::{KeeperError, KeeperResult};
use crate::identity::IdentityResolver;
use crate::keeper::SecretKeeper;
use crate::types::{Endpoint, HandleId, OpenMode, TransferOp};

/// Handles held by one client connection.
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    handles: BTreeMap<HandleId, OpenMode>,
    next_handle: u32,
}

impl Session {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            handles: BTreeMap::new(),
            next_handle: 1,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Number of handles this session still holds.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn mode_of(&self, handle: HandleId) -> Option<OpenMode> {
        self.handles.get(&handle).copied()
    }

    pub fn open<R: IdentityResolver>(
        &mut self,
        keeper: &mut SecretKeeper<R>,
        mode: OpenMode,
    ) -> KeeperResult<HandleId> {
        // Ids wrap around; skip any still held.
        let mut id = self.next_handle;
        while self.handles.contains_key(&HandleId::new(id)) {
            id = id.wrapping_add(1).max(1);
        }

        keeper.open(mode, self.endpoint)?;

        let handle = HandleId::new(id);
        self.next_handle = id.wrapping_add(1).max(1);
        self.handles.insert(handle, mode);
        Ok(handle)
    }

    pub fn close<R: IdentityResolver>(
        &mut self,
        keeper: &mut SecretKeeper<R>,
        handle: HandleId,
    ) -> KeeperResult<CloseOutcome> {
        if self.handles.remove(&handle).is_none() {
            return Err(KeeperError::HandleNotOpen { handle });
        }
        Ok(keeper.close())
    }

    pub fn transfer<R: IdentityResolver>(
        &mut self,
        keeper: &mut SecretKeeper<R>,
        handle: HandleId,
        op: TransferOp,
        position: u64,
        regions: &mut [&mut [u8]],
    ) -> KeeperResult<usize> {
        if !self.handles.contains_key(&handle) {
            return Err(KeeperError::HandleNotOpen { handle });
        }
        keeper.transfer(op, position, regions)
    }

    /// Close every handle still held. Returns how many were closed.
    pub fn release_all<R: IdentityResolver>(&mut self, keeper: &mut SecretKeeper<R>) -> usize {
        let count = self.handles.len();
        for _ in std::mem::take(&mut self.handles) {
            keeper.close();
        }
        if count > 0 {
            tracing::debug!(endpoint = %self.endpoint, handles = count, "Released session handles");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerRegistry;
    use crate::slot::SlotState;
    use crate::types::{CallerId, Capacity};

    fn setup() -> (SecretKeeper<PeerRegistry>, Session, Session) {
        let peers = PeerRegistry::new();
        peers.register(Endpoint::new(1), CallerId::new(1000));
        peers.register(Endpoint::new(2), CallerId::new(2000));
        (
            SecretKeeper::new(Capacity::new(8).unwrap(), peers),
            Session::new(Endpoint::new(1)),
            Session::new(Endpoint::new(2)),
        )
    }

    #[test]
    fn test_handles_are_distinct() {
        let (mut keeper, mut alice, _) = setup();
        let a = alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();
        let b = alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();
        assert_ne!(a, b);
        assert_eq!(alice.open_handles(), 2);
        assert_eq!(alice.mode_of(a), Some(OpenMode::ReadOnly));
    }

    #[test]
    fn test_wrapped_handle_ids_skip_held_handles() {
        let (mut keeper, mut alice, _) = setup();
        let first = alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();
        assert_eq!(first, HandleId::new(1));

        alice.next_handle = u32::MAX;
        let last = alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();
        let wrapped = alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();

        assert_eq!(last, HandleId::new(u32::MAX));
        assert_eq!(wrapped, HandleId::new(2));
        assert_eq!(alice.open_handles(), 3);
        assert_eq!(keeper.slot().open_count(), 3);

        for handle in [first, last, wrapped] {
            alice.close(&mut keeper, handle).unwrap();
        }
        assert_eq!(keeper.slot().open_count(), 0);
    }

    #[test]
    fn test_failed_open_allocates_no_handle() {
        let (mut keeper, mut alice, mut bob) = setup();
        alice.open(&mut keeper, OpenMode::WriteOnly).unwrap();

        assert_eq!(
            bob.open(&mut keeper, OpenMode::WriteOnly),
            Err(KeeperError::NoSpace)
        );
        assert_eq!(bob.open_handles(), 0);
        assert_eq!(keeper.slot().open_count(), 1);
    }

    #[test]
    fn test_close_unknown_handle() {
        let (mut keeper, mut alice, mut bob) = setup();
        let handle = alice.open(&mut keeper, OpenMode::WriteOnly).unwrap();

        // Bob cannot close Alice's handle.
        assert_eq!(
            bob.close(&mut keeper, handle),
            Err(KeeperError::HandleNotOpen { handle })
        );
        assert_eq!(keeper.slot().open_count(), 1);

        alice.close(&mut keeper, handle).unwrap();
        assert_eq!(
            alice.close(&mut keeper, handle),
            Err(KeeperError::HandleNotOpen { handle })
        );
        assert_eq!(keeper.slot().open_count(), 0);
    }

    #[test]
    fn test_transfer_requires_handle() {
        let (mut keeper, mut alice, _) = setup();
        let mut data = *b"hi";
        let err = alice
            .transfer(
                &mut keeper,
                HandleId::new(1),
                TransferOp::Write,
                0,
                &mut [&mut data[..]],
            )
            .unwrap_err();
        assert!(matches!(err, KeeperError::HandleNotOpen { .. }));
        assert!(keeper.slot().is_zeroed());
    }

    #[test]
    fn test_release_all_erases_consumed_secret() {
        let (mut keeper, mut alice, _) = setup();
        let w = alice.open(&mut keeper, OpenMode::WriteOnly).unwrap();
        let mut data = *b"pin";
        alice
            .transfer(&mut keeper, w, TransferOp::Write, 0, &mut [&mut data[..]])
            .unwrap();
        alice.close(&mut keeper, w).unwrap();

        alice.open(&mut keeper, OpenMode::ReadOnly).unwrap();
        assert_eq!(keeper.slot().state(), SlotState::Empty);
        assert!(!keeper.slot().is_zeroed());

        // Client vanishes without closing.
        assert_eq!(alice.release_all(&mut keeper), 1);
        assert_eq!(keeper.slot().open_count(), 0);
        assert!(keeper.slot().is_zeroed());
    }
}
