//! # Identity Trees
//!
//! Each identity owns three sparse Merkle trees:
//!
//! - **claims**: `hi → hv` of every claim the identity has issued;
//! - **revocation**: revocation nonce → zero;
//! - **roots**: history of published claims roots.
//!
//! The identity state is `H(claimsRoot, revocationRoot, rootsRoot)` and is
//! always computed from the roots, never stored beside them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zkid_claim::{CoreClaim, RevocationNonce};
use zkid_core::Hash;
use zkid_crypto::{hash_elems, MerkleProof, SparseMerkleTree};

use crate::error::StateError;

/// One of the three identity trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    /// Issued claims.
    Claims,
    /// Revoked nonces.
    Revocation,
    /// Published claims roots.
    Roots,
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeKind::Claims => "claims",
            TreeKind::Revocation => "revocation",
            TreeKind::Roots => "roots",
        })
    }
}

/// The three roots of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRoots {
    /// Claims tree root.
    pub claims_root: Hash,
    /// Revocation tree root.
    pub revocation_root: Hash,
    /// Roots tree root.
    pub roots_root: Hash,
}

impl TreeRoots {
    /// Identity state digest.
    pub fn state(&self) -> Hash {
        hash_elems(&[self.claims_root, self.revocation_root, self.roots_root])
    }
}

/// The trees of one identity plus the claims they commit to.
#[derive(Debug, Clone)]
pub struct IdentityTrees {
    claims: SparseMerkleTree,
    revocation: SparseMerkleTree,
    roots: SparseMerkleTree,
    issued: BTreeMap<Hash, CoreClaim>,
}

impl IdentityTrees {
    /// Empty trees of depth `max_levels`.
    pub fn new(max_levels: usize) -> Self {
        Self {
            claims: SparseMerkleTree::new(max_levels),
            revocation: SparseMerkleTree::new(max_levels),
            roots: SparseMerkleTree::new(max_levels),
            issued: BTreeMap::new(),
        }
    }

    /// Current roots.
    pub fn roots(&self) -> TreeRoots {
        TreeRoots {
            claims_root: self.claims.root(),
            revocation_root: self.revocation.root(),
            roots_root: self.roots.root(),
        }
    }

    /// Current state digest.
    pub fn state(&self) -> Hash {
        self.roots().state()
    }

    /// Access one tree.
    pub fn tree(&self, kind: TreeKind) -> &SparseMerkleTree {
        match kind {
            TreeKind::Claims => &self.claims,
            TreeKind::Revocation => &self.revocation,
            TreeKind::Roots => &self.roots,
        }
    }

    /// Add a claim to the claims tree.
    pub fn insert_claim(&mut self, claim: &CoreClaim) -> Result<(), StateError> {
        let hi = claim.hi();
        self.claims
            .insert(hi, claim.hv())
            .map_err(StateError::tree(TreeKind::Claims))?;
        self.issued.insert(hi, *claim);
        Ok(())
    }

    /// Mark a nonce revoked.
    pub fn revoke(&mut self, nonce: RevocationNonce) -> Result<(), StateError> {
        self.revocation
            .insert(nonce.to_hash(), Hash::ZERO)
            .map_err(StateError::tree(TreeKind::Revocation))
    }

    /// Record the current claims root in the roots tree.
    pub fn publish_claims_root(&mut self) -> Result<(), StateError> {
        let root = self.claims.root();
        self.roots
            .insert(root, Hash::ZERO)
            .map_err(StateError::tree(TreeKind::Roots))
    }

    /// Whether `nonce` has been revoked.
    pub fn is_revoked(&self, nonce: RevocationNonce) -> bool {
        self.revocation.contains(&nonce.to_hash())
    }

    /// A claim previously inserted, by its `hi`.
    pub fn claim(&self, hi: &Hash) -> Option<&CoreClaim> {
        self.issued.get(hi)
    }

    /// All inserted claims.
    pub fn claims(&self) -> impl Iterator<Item = &CoreClaim> {
        self.issued.values()
    }

    /// General proof for `key`.
    pub fn proof(&self, kind: TreeKind, key: &Hash) -> Result<MerkleProof, StateError> {
        self.tree(kind)
            .generate_proof(key)
            .map_err(StateError::tree(kind))
    }
}
