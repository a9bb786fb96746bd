//! # Global State Tree
//!
//! The network-wide map from identity to its latest published state. Auth
//! proofs show that the holder's state is (or, for a never-published genesis
//! identity, is not) a leaf of this tree.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use zkid_core::{Hash, IdentityId};
use zkid_crypto::{hash_elems, MerkleProof, SparseMerkleTree, TreeError};

/// Depth of the global state tree.
pub const GIST_LEVELS: usize = 64;

/// Proof of an identity's entry in the global state tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistProof {
    /// Tree root the proof is against.
    pub root: Hash,
    /// Proof for the identity's key.
    pub proof: MerkleProof,
}

/// Tree key of an identity.
pub fn gist_key(id: &IdentityId) -> Hash {
    hash_elems(&[id.to_hash()])
}

/// In-memory global state tree.
#[derive(Debug, Clone)]
pub struct GlobalStateTree {
    tree: Arc<RwLock<SparseMerkleTree>>,
}

impl Default for GlobalStateTree {
    fn default() -> Self {
        Self::new(GIST_LEVELS)
    }
}

impl GlobalStateTree {
    /// An empty tree of depth `levels`.
    pub fn new(levels: usize) -> Self {
        Self {
            tree: Arc::new(RwLock::new(SparseMerkleTree::new(levels))),
        }
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        self.tree.read().root()
    }

    /// Publish `state` as the latest state of `id`.
    pub fn publish(&self, id: &IdentityId, state: Hash) -> Result<Hash, TreeError> {
        let key = gist_key(id);
        let mut tree = self.tree.write();
        if tree.contains(&key) {
            tree.update(key, state)?;
        } else {
            tree.insert(key, state)?;
        }
        tracing::info!(id = %id, state = %state, root = %tree.root(), "state published");
        Ok(tree.root())
    }

    /// Latest published state of `id`.
    pub fn state_of(&self, id: &IdentityId) -> Option<Hash> {
        self.tree.read().get(&gist_key(id)).ok()
    }

    /// Proof for `id` against the current root.
    pub fn proof(&self, id: &IdentityId) -> Result<GistProof, TreeError> {
        let tree = self.tree.read();
        Ok(GistProof {
            root: tree.root(),
            proof: tree.generate_proof(&gist_key(id))?,
        })
    }
}
