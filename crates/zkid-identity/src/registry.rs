//! Identity registry.
//!
//! Maps DIDs to [`ManagedIdentity`] handles and owns the
//! [`GlobalStateTree`] that identities publish their state to. The map lock
//! is never held while an identity's own tree lock is taken for writing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use zkid_core::{Did, Hash, IdentityId};
use zkid_crypto::Ed25519PublicKey;

use crate::error::StateError;
use crate::gist::GlobalStateTree;
use crate::manager::{ManagedIdentity, TreeConfig};

/// Thread-safe, cloneable identity registry.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    identities: Arc<RwLock<HashMap<IdentityId, ManagedIdentity>>>,
    gist: GlobalStateTree,
    config: TreeConfig,
}

impl IdentityRegistry {
    /// An empty registry creating identities with `config`.
    pub fn new(config: TreeConfig) -> Self {
        Self {
            identities: Arc::default(),
            gist: GlobalStateTree::default(),
            config,
        }
    }

    /// Tree settings used for new identities.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The global state tree.
    pub fn gist(&self) -> &GlobalStateTree {
        &self.gist
    }

    /// Create and register an identity for `key`.
    pub fn create(&self, key: &Ed25519PublicKey) -> Result<ManagedIdentity, StateError> {
        let identity = ManagedIdentity::create(key, &self.config)?;
        self.register(identity.clone())?;
        Ok(identity)
    }

    /// Register an existing handle.
    pub fn register(&self, identity: ManagedIdentity) -> Result<(), StateError> {
        let mut map = self.identities.write();
        if map.contains_key(&identity.id()) {
            return Err(StateError::DuplicateIdentity(identity.did().clone()));
        }
        map.insert(identity.id(), identity);
        Ok(())
    }

    /// Look up an identity by DID.
    pub fn get(&self, did: &Did) -> Result<ManagedIdentity, StateError> {
        let id = did.identity_id()?;
        self.identities
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StateError::UnknownIdentity(did.clone()))
    }

    /// Look up the identity controlled by `key`.
    pub fn get_by_key(&self, key: &Ed25519PublicKey) -> Result<ManagedIdentity, StateError> {
        self.get(&ManagedIdentity::derive_did(key, &self.config)?)
    }

    /// Publish the current state of `did` to the global state tree.
    pub fn publish_state(&self, did: &Did) -> Result<Hash, StateError> {
        let identity = self.get(did)?;
        let state = identity.state();
        self.gist.publish(&identity.id(), state).map_err(StateError::Gist)?;
        Ok(state)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
