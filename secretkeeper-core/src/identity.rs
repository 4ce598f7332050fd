// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Caller identity resolution.
//!
//! The transport knows callers by [`Endpoint`]; the slot only trusts
//! [`CallerId`]. A resolver maps one to the other before any state check.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{KeeperError, KeeperResult};
use crate::types::{CallerId, Endpoint};

/// Maps a transport endpoint to a stable caller identity.
pub trait IdentityResolver {
    fn resolve(&self, endpoint: Endpoint) -> KeeperResult<CallerId>;
}

impl<R: IdentityResolver + ?Sized> IdentityResolver for Arc<R> {
    fn resolve(&self, endpoint: Endpoint) -> KeeperResult<CallerId> {
        (**self).resolve(endpoint)
    }
}

impl<R: IdentityResolver + ?Sized> IdentityResolver for &R {
    fn resolve(&self, endpoint: Endpoint) -> KeeperResult<CallerId> {
        (**self).resolve(endpoint)
    }
}

/// Credentials of connected peers, keyed by endpoint.
///
/// The transport registers a peer when it accepts the connection and
/// forgets it on disconnect. Uses DashMap so connection tasks can register
/// without holding the slot lock.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<Endpoint, CallerId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry wrapped in an Arc for sharing with the transport.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Record the credentials of a newly connected peer.
    pub fn register(&self, endpoint: Endpoint, caller: CallerId) {
        tracing::debug!(endpoint = %endpoint, caller = %caller, "Peer registered");
        self.peers.insert(endpoint, caller);
    }

    /// Forget a peer. Returns the identity it had, if any.
    pub fn unregister(&self, endpoint: Endpoint) -> Option<CallerId> {
        self.peers.remove(&endpoint).map(|(_, caller)| caller)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl IdentityResolver for PeerRegistry {
    fn resolve(&self, endpoint: Endpoint) -> KeeperResult<CallerId> {
        self.peers
            .get(&endpoint)
            .map(|entry| *entry.value())
            .ok_or_else(|| KeeperError::CredentialLookupFailed {
                reason: format!("no credentials recorded for {}", endpoint),
            })
    }
}
