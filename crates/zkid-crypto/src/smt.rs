//! # Sparse Merkle Tree
//!
//! A key-addressed binary Merkle tree with compressed leaves: a leaf sits at
//! the shallowest level where its path no longer collides with any other key,
//! so trees stay shallow regardless of the 256-bit key space. The path of a
//! key is its little-endian bit sequence (bit 0 chooses the first branch).
//!
//! ## Hashing
//!
//! - Empty subtree: [`Hash::ZERO`].
//! - Leaf: [`hash_leaf`]`(key, value)`.
//! - Middle node: [`hash_node`]`(left, right)`.
//!
//! ## Proofs
//!
//! [`SparseMerkleTree::generate_proof`] walks the path of a key and returns
//! the sibling hashes. The walk ends at one of:
//!
//! - the key's own leaf: inclusion (`existence = true`);
//! - an empty node: non-inclusion with no auxiliary leaf (`no_aux`);
//! - a different leaf: non-inclusion, the leaf is returned as [`NodeAux`]
//!   (its key/value become `auxHi`/`auxHv` in circuit inputs).
//!
//! Node storage is a content-addressed map holding exactly the nodes
//! reachable from the root. A successful write drops the nodes it replaced;
//! a failed write drops the nodes it created and leaves the root untouched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkid_core::{CryptoError, Hash, ValidationError, ZkidError};

use crate::hash::{hash_leaf, hash_node};

/// Default maximum depth, matching the auth circuits' sibling count.
pub const DEFAULT_MAX_LEVELS: usize = 40;

/// Errors from tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The key is already present.
    #[error("key {0} already exists in the tree")]
    KeyExists(Hash),

    /// The key is not present.
    #[error("key {0} not found in the tree")]
    KeyNotFound(Hash),

    /// Two keys share a path prefix longer than the tree depth.
    #[error("reached maximum tree depth of {0} levels")]
    ReachedMaxLevel(usize),

    /// A node referenced by hash is missing from storage.
    #[error("node {0} missing from storage")]
    NodeNotFound(Hash),
}

impl From<TreeError> for ZkidError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NodeNotFound(_) => CryptoError::DigestError(err.to_string()).into(),
            other => ValidationError::InvalidField {
                field: "tree key".to_string(),
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf { key: Hash, value: Hash },
    Middle { left: Hash, right: Hash },
}

impl Node {
    fn hash(&self) -> Hash {
        match self {
            Node::Leaf { key, value } => hash_leaf(key, value),
            Node::Middle { left, right } => hash_node(left, right),
        }
    }
}

/// The leaf found where a non-member key's path ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    /// Key of the occupying leaf.
    pub key: Hash,
    /// Value of the occupying leaf.
    pub value: Hash,
}

/// An inclusion or non-inclusion proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// True if the key is present.
    pub existence: bool,
    /// Sibling hashes from the root downwards.
    pub siblings: Vec<Hash>,
    /// Occupying leaf for a non-membership proof that ended at a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_aux: Option<NodeAux>,
}

impl MerkleProof {
    /// Non-membership proof whose path ended at an empty node.
    pub fn no_aux(&self) -> bool {
        !self.existence && self.node_aux.is_none()
    }

    /// `auxHi` circuit input: the occupying leaf's key, or zero.
    pub fn aux_hi(&self) -> Hash {
        self.node_aux.map(|a| a.key).unwrap_or(Hash::ZERO)
    }

    /// `auxHv` circuit input: the occupying leaf's value, or zero.
    pub fn aux_hv(&self) -> Hash {
        self.node_aux.map(|a| a.value).unwrap_or(Hash::ZERO)
    }

    /// Siblings right-padded with zeros to `levels` entries.
    pub fn siblings_padded(&self, levels: usize) -> Vec<Hash> {
        let mut out = self.siblings.clone();
        out.resize(levels.max(out.len()), Hash::ZERO);
        out
    }

    /// Recompute the root this proof commits to for `(key, value)`.
    ///
    /// For a non-membership proof `value` is ignored.
    pub fn root(&self, key: &Hash, value: &Hash) -> Hash {
        let mut cur = if self.existence {
            hash_leaf(key, value)
        } else if let Some(aux) = &self.node_aux {
            hash_leaf(&aux.key, &aux.value)
        } else {
            Hash::ZERO
        };
        for (lvl, sibling) in self.siblings.iter().enumerate().rev() {
            cur = if key.bit(lvl) {
                hash_node(sibling, &cur)
            } else {
                hash_node(&cur, sibling)
            };
        }
        cur
    }

    /// Check this proof against `root`.
    pub fn verify(&self, root: &Hash, key: &Hash, value: &Hash) -> bool {
        if let Some(aux) = &self.node_aux {
            if self.existence || aux.key == *key {
                return false;
            }
        }
        self.root(key, value) == *root
    }
}

/// A sparse Merkle tree keyed and valued by [`Hash`].
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    root: Hash,
    nodes: HashMap<Hash, Node>,
    max_levels: usize,
    leaf_count: usize,
}

impl Default for SparseMerkleTree {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEVELS)
    }
}

impl SparseMerkleTree {
    /// An empty tree of the given depth.
    pub fn new(max_levels: usize) -> Self {
        Self {
            root: Hash::ZERO,
            nodes: HashMap::new(),
            max_levels,
            leaf_count: 0,
        }
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Maximum depth.
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    /// Returns true if the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    fn node(&self, hash: &Hash) -> Result<Option<&Node>, TreeError> {
        if hash.is_zero() {
            return Ok(None);
        }
        self.nodes
            .get(hash)
            .map(Some)
            .ok_or(TreeError::NodeNotFound(*hash))
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn store(&mut self, node: Node, written: &mut Vec<Hash>) -> Hash {
        let hash = node.hash();
        if self.nodes.insert(hash, node).is_none() {
            written.push(hash);
        }
        hash
    }

    /// Nodes on the path of `key` and their siblings.
    fn path_nodes(&self, key: &Hash) -> Result<Vec<Hash>, TreeError> {
        let mut out = Vec::new();
        let mut cur = self.root;
        for lvl in 0..self.max_levels {
            match self.node(&cur)? {
                None => break,
                Some(Node::Leaf { .. }) => {
                    out.push(cur);
                    break;
                }
                Some(Node::Middle { left, right }) => {
                    out.push(cur);
                    let (next, sibling) = if key.bit(lvl) { (*right, *left) } else { (*left, *right) };
                    if !sibling.is_zero() {
                        out.push(sibling);
                    }
                    cur = next;
                }
            }
        }
        Ok(out)
    }

    /// Install `new_root` after a write along the path of `key`, or roll the
    /// write back if it failed.
    fn commit(
        &mut self,
        key: &Hash,
        old_path: Vec<Hash>,
        written: Vec<Hash>,
        new_root: Result<Hash, TreeError>,
    ) -> Result<(), TreeError> {
        let new_root = match new_root {
            Ok(root) => root,
            Err(e) => {
                for hash in written {
                    self.nodes.remove(&hash);
                }
                return Err(e);
            }
        };
        self.root = new_root;
        let live: HashSet<Hash> = self.path_nodes(key)?.into_iter().collect();
        for hash in old_path {
            if !live.contains(&hash) {
                self.nodes.remove(&hash);
            }
        }
        Ok(())
    }

    /// Insert `key → value`. Fails with [`TreeError::KeyExists`] on a
    /// duplicate key; the tree is unchanged on any error.
    pub fn insert(&mut self, key: Hash, value: Hash) -> Result<(), TreeError> {
        let old_path = self.path_nodes(&key)?;
        let mut written = Vec::new();
        let new_root = self.add_leaf(key, value, self.root, 0, &mut written);
        self.commit(&key, old_path, written, new_root)?;
        self.leaf_count += 1;
        Ok(())
    }

    fn add_leaf(
        &mut self,
        key: Hash,
        value: Hash,
        cur: Hash,
        lvl: usize,
        written: &mut Vec<Hash>,
    ) -> Result<Hash, TreeError> {
        if lvl >= self.max_levels {
            return Err(TreeError::ReachedMaxLevel(self.max_levels));
        }
        match self.node(&cur)?.cloned() {
            None => Ok(self.store(Node::Leaf { key, value }, written)),
            Some(Node::Leaf { key: old_key, value: old_value }) => {
                if old_key == key {
                    return Err(TreeError::KeyExists(key));
                }
                self.push_leaf(key, value, old_key, old_value, lvl, written)
            }
            Some(Node::Middle { left, right }) => {
                let node = if key.bit(lvl) {
                    let right = self.add_leaf(key, value, right, lvl + 1, written)?;
                    Node::Middle { left, right }
                } else {
                    let left = self.add_leaf(key, value, left, lvl + 1, written)?;
                    Node::Middle { left, right }
                };
                Ok(self.store(node, written))
            }
        }
    }

    /// Push an existing leaf down until its path diverges from the new key.
    fn push_leaf(
        &mut self,
        key: Hash,
        value: Hash,
        old_key: Hash,
        old_value: Hash,
        lvl: usize,
        written: &mut Vec<Hash>,
    ) -> Result<Hash, TreeError> {
        if lvl + 1 >= self.max_levels {
            return Err(TreeError::ReachedMaxLevel(self.max_levels));
        }
        let new_bit = key.bit(lvl);
        if new_bit == old_key.bit(lvl) {
            let child = self.push_leaf(key, value, old_key, old_value, lvl + 1, written)?;
            let node = if new_bit {
                Node::Middle { left: Hash::ZERO, right: child }
            } else {
                Node::Middle { left: child, right: Hash::ZERO }
            };
            return Ok(self.store(node, written));
        }
        let new_leaf = self.store(Node::Leaf { key, value }, written);
        let old_leaf = self.store(Node::Leaf { key: old_key, value: old_value }, written);
        let node = if new_bit {
            Node::Middle { left: old_leaf, right: new_leaf }
        } else {
            Node::Middle { left: new_leaf, right: old_leaf }
        };
        Ok(self.store(node, written))
    }

    /// Replace the value of an existing key, returning the old value.
    pub fn update(&mut self, key: Hash, value: Hash) -> Result<Hash, TreeError> {
        let old = self.get(&key)?;
        let old_path = self.path_nodes(&key)?;
        let mut written = Vec::new();
        let new_root = self.update_leaf(key, value, self.root, 0, &mut written);
        self.commit(&key, old_path, written, new_root)?;
        Ok(old)
    }

    fn update_leaf(
        &mut self,
        key: Hash,
        value: Hash,
        cur: Hash,
        lvl: usize,
        written: &mut Vec<Hash>,
    ) -> Result<Hash, TreeError> {
        if lvl >= self.max_levels {
            return Err(TreeError::KeyNotFound(key));
        }
        match self.node(&cur)?.cloned() {
            Some(Node::Leaf { key: k, .. }) if k == key => Ok(self.store(Node::Leaf { key, value }, written)),
            None | Some(Node::Leaf { .. }) => Err(TreeError::KeyNotFound(key)),
            Some(Node::Middle { left, right }) => {
                let node = if key.bit(lvl) {
                    let right = self.update_leaf(key, value, right, lvl + 1, written)?;
                    Node::Middle { left, right }
                } else {
                    let left = self.update_leaf(key, value, left, lvl + 1, written)?;
                    Node::Middle { left, right }
                };
                Ok(self.store(node, written))
            }
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &Hash) -> Result<Hash, TreeError> {
        let mut cur = self.root;
        for lvl in 0..self.max_levels {
            match self.node(&cur)? {
                None => break,
                Some(Node::Leaf { key: k, value }) => {
                    if k == key {
                        return Ok(*value);
                    }
                    break;
                }
                Some(Node::Middle { left, right }) => {
                    cur = if key.bit(lvl) { *right } else { *left };
                }
            }
        }
        Err(TreeError::KeyNotFound(*key))
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &Hash) -> bool {
        self.get(key).is_ok()
    }

    /// Membership or non-membership proof for `key` against the current root.
    pub fn generate_proof(&self, key: &Hash) -> Result<MerkleProof, TreeError> {
        let mut siblings = Vec::new();
        let mut cur = self.root;
        for lvl in 0..self.max_levels {
            match self.node(&cur)? {
                None => {
                    return Ok(MerkleProof { existence: false, siblings, node_aux: None });
                }
                Some(Node::Leaf { key: k, value }) => {
                    if k == key {
                        return Ok(MerkleProof { existence: true, siblings, node_aux: None });
                    }
                    return Ok(MerkleProof {
                        existence: false,
                        siblings,
                        node_aux: Some(NodeAux { key: *k, value: *value }),
                    });
                }
                Some(Node::Middle { left, right }) => {
                    if key.bit(lvl) {
                        siblings.push(*left);
                        cur = *right;
                    } else {
                        siblings.push(*right);
                        cur = *left;
                    }
                }
            }
        }
        Err(TreeError::ReachedMaxLevel(self.max_levels))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_member_and_non_member_proves(
            keys in btree_set(any::<u64>(), 1..24),
            absent in any::<u64>(),
        ) {
            let mut tree = SparseMerkleTree::new(64);
            for k in &keys {
                tree.insert(Hash::from_u64(*k), Hash::from_u64(k.wrapping_mul(3))).unwrap();
            }
            let root = tree.root();
            // Only reachable nodes are stored: n leaves, at least n - 1
            // middle nodes, at most 63 middle nodes per leaf path.
            prop_assert!(tree.node_count() <= keys.len() * 64);
            prop_assert!(tree.node_count() >= 2 * keys.len() - 1);
            for k in &keys {
                let key = Hash::from_u64(*k);
                let value = Hash::from_u64(k.wrapping_mul(3));
                let proof = tree.generate_proof(&key).unwrap();
                prop_assert!(proof.existence);
                prop_assert!(proof.verify(&root, &key, &value));
            }
            if !keys.contains(&absent) {
                let key = Hash::from_u64(absent);
                let proof = tree.generate_proof(&key).unwrap();
                prop_assert!(!proof.existence);
                prop_assert!(proof.verify(&root, &key, &Hash::ZERO));
            }
        }
    }
}
