//! # Managed Identity
//!
//! [`ManagedIdentity`] wraps an identity's trees in a `parking_lot::RwLock`
//! and is the only way to mutate them.
//!
//! ## Atomicity
//!
//! Every mutation runs through [`ManagedIdentity::apply`]: under an
//! upgradable read lock the trees are cloned and the operation runs on the
//! copy. Only a successful copy is installed, after upgrading to the write
//! lock for the swap. Mutations are serialized by the upgradable lock while
//! plain readers keep going, and they see either the old or the new trees,
//! never a state digest computed halfway through a mutation.
//!
//! Proofs are returned together with the roots they were generated against
//! ([`TreeProof`]), both read under one lock acquisition.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use zkid_claim::{auth_claim, CoreClaim, RevocationNonce};
use zkid_core::{Did, Hash, IdentityId, ID_TYPE_ED25519};
use zkid_crypto::{Ed25519PublicKey, MerkleProof, DEFAULT_MAX_LEVELS};

use crate::error::StateError;
use crate::trees::{IdentityTrees, TreeKind, TreeRoots};

/// Tree and identifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of each identity tree.
    pub max_levels: usize,
    /// Network segment of generated DIDs.
    pub network: String,
    /// Identity type prefix.
    pub id_type: [u8; 2],
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            network: "main".to_string(),
            id_type: ID_TYPE_ED25519,
        }
    }
}

/// A consistent view of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Identity state digest.
    pub state: Hash,
    /// The roots the state was computed from.
    pub roots: TreeRoots,
}

/// A proof plus the roots it was generated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeProof {
    /// Tree the proof refers to.
    pub tree: TreeKind,
    /// The proof.
    pub proof: MerkleProof,
    /// Identity roots at proof time.
    pub snapshot: IdentitySnapshot,
}

impl TreeProof {
    /// Root of the tree the proof refers to.
    pub fn tree_root(&self) -> Hash {
        match self.tree {
            TreeKind::Claims => self.snapshot.roots.claims_root,
            TreeKind::Revocation => self.snapshot.roots.revocation_root,
            TreeKind::Roots => self.snapshot.roots.roots_root,
        }
    }
}

/// Proofs about the auth claim, all taken against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaimProofs {
    /// The auth claim.
    pub claim: CoreClaim,
    /// Inclusion of the claim in the claims tree.
    pub inclusion: MerkleProof,
    /// Revocation-tree proof for the claim's nonce.
    pub non_revocation: MerkleProof,
    /// Roots both proofs were generated against.
    pub snapshot: IdentitySnapshot,
}

impl AuthClaimProofs {
    /// Whether the claim is present and its nonce is not revoked.
    pub fn is_valid(&self) -> bool {
        self.inclusion.existence && !self.non_revocation.existence
    }
}

/// An identity whose trees are maintained locally.
///
/// Cloning is cheap and yields a handle to the same trees.
#[derive(Debug, Clone)]
pub struct ManagedIdentity {
    id: IdentityId,
    did: Did,
    genesis_state: Hash,
    auth_claim: CoreClaim,
    trees: Arc<RwLock<IdentityTrees>>,
}

impl ManagedIdentity {
    /// Create an identity controlled by `key`.
    ///
    /// The genesis claims tree holds only the key's auth claim; the genesis
    /// state determines the identity id and DID.
    pub fn create(key: &Ed25519PublicKey, config: &TreeConfig) -> Result<Self, StateError> {
        let (trees, auth_claim) = genesis_trees(key, config)?;
        let genesis_state = trees.state();
        let id = IdentityId::from_genesis(config.id_type, &genesis_state);
        let did = Did::from_identity(&config.network, &id)?;

        tracing::info!(did = %did, state = %genesis_state, "identity created");

        Ok(Self {
            id,
            did,
            genesis_state,
            auth_claim,
            trees: Arc::new(RwLock::new(trees)),
        })
    }

    /// DID of the identity `key` would create, without creating it.
    pub fn derive_did(key: &Ed25519PublicKey, config: &TreeConfig) -> Result<Did, StateError> {
        let (trees, _) = genesis_trees(key, config)?;
        let id = IdentityId::from_genesis(config.id_type, &trees.state());
        Ok(Did::from_identity(&config.network, &id)?)
    }

    /// Identity id.
    pub fn id(&self) -> IdentityId {
        self.id
    }

    /// DID.
    pub fn did(&self) -> &Did {
        &self.did
    }

    /// State at creation.
    pub fn genesis_state(&self) -> Hash {
        self.genesis_state
    }

    /// The auth claim inserted at genesis.
    pub fn auth_claim(&self) -> &CoreClaim {
        &self.auth_claim
    }

    /// Current state and roots.
    pub fn snapshot(&self) -> IdentitySnapshot {
        let trees = self.trees.read();
        IdentitySnapshot {
            state: trees.state(),
            roots: trees.roots(),
        }
    }

    /// Current state digest.
    pub fn state(&self) -> Hash {
        self.snapshot().state
    }

    /// Run `op` against a staged copy of the trees and commit it if it
    /// succeeds. Readers are blocked only for the final swap.
    pub fn apply<F>(&self, op: &'static str, f: F) -> Result<IdentitySnapshot, StateError>
    where
        F: FnOnce(&mut IdentityTrees) -> Result<(), StateError>,
    {
        let guard = self.trees.upgradable_read();
        let mut staged = guard.clone();
        if let Err(e) = f(&mut staged) {
            tracing::warn!(did = %self.did, op, "identity mutation rejected: {e}");
            return Err(e);
        }
        let snapshot = IdentitySnapshot {
            state: staged.state(),
            roots: staged.roots(),
        };
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        *guard = staged;
        drop(guard);
        tracing::debug!(did = %self.did, op, state = %snapshot.state, "identity state committed");
        Ok(snapshot)
    }

    /// Insert a claim into the claims tree.
    pub fn insert_claim(&self, claim: &CoreClaim) -> Result<IdentitySnapshot, StateError> {
        self.apply("insert_claim", |trees| trees.insert_claim(claim))
    }

    /// Insert a nonce into the revocation tree.
    pub fn revoke(&self, nonce: RevocationNonce) -> Result<IdentitySnapshot, StateError> {
        self.apply("revoke", |trees| trees.revoke(nonce))
    }

    /// Record the current claims root in the roots tree.
    pub fn publish_roots(&self) -> Result<IdentitySnapshot, StateError> {
        self.apply("publish_roots", |trees| trees.publish_claims_root())
    }

    /// Whether `nonce` has been revoked.
    pub fn is_revoked(&self, nonce: RevocationNonce) -> bool {
        self.trees.read().is_revoked(nonce)
    }

    /// A claim inserted into this identity's claims tree, by `hi`.
    pub fn claim(&self, hi: &Hash) -> Option<CoreClaim> {
        self.trees.read().claim(hi).copied()
    }

    /// All claims in the claims tree.
    pub fn claims(&self) -> Vec<CoreClaim> {
        self.trees.read().claims().copied().collect()
    }

    fn proof_with<F>(&self, tree: TreeKind, key: &Hash, check: F) -> Result<TreeProof, StateError>
    where
        F: FnOnce(&MerkleProof) -> Result<(), StateError>,
    {
        let trees = self.trees.read();
        let proof = trees.proof(tree, key)?;
        check(&proof)?;
        Ok(TreeProof {
            tree,
            proof,
            snapshot: IdentitySnapshot {
                state: trees.state(),
                roots: trees.roots(),
            },
        })
    }

    /// Membership or non-membership proof for `key`.
    pub fn proof(&self, tree: TreeKind, key: &Hash) -> Result<TreeProof, StateError> {
        self.proof_with(tree, key, |_| Ok(()))
    }

    /// Membership proof; [`StateError::NotFound`] if `key` is absent.
    pub fn prove_inclusion(&self, tree: TreeKind, key: &Hash) -> Result<TreeProof, StateError> {
        self.proof_with(tree, key, |p| {
            if p.existence {
                Ok(())
            } else {
                Err(StateError::NotFound { tree, key: *key })
            }
        })
    }

    /// Non-membership proof; [`StateError::AlreadyPresent`] if `key` is present.
    pub fn prove_non_inclusion(&self, tree: TreeKind, key: &Hash) -> Result<TreeProof, StateError> {
        self.proof_with(tree, key, |p| {
            if p.existence {
                Err(StateError::AlreadyPresent { tree, key: *key })
            } else {
                Ok(())
            }
        })
    }

    /// Inclusion proof for a claim in the claims tree.
    pub fn claim_proof(&self, claim: &CoreClaim) -> Result<TreeProof, StateError> {
        self.prove_inclusion(TreeKind::Claims, &claim.hi())
    }

    /// Revocation-tree proof for `nonce`: non-membership while the claim is
    /// valid, membership once it is revoked.
    pub fn revocation_proof(&self, nonce: RevocationNonce) -> Result<TreeProof, StateError> {
        self.proof(TreeKind::Revocation, &nonce.to_hash())
    }

    /// Inclusion and non-revocation proofs for the auth claim under one read
    /// lock. Neither proof is checked; see [`AuthClaimProofs::is_valid`].
    pub fn auth_claim_proofs(&self) -> Result<AuthClaimProofs, StateError> {
        let claim = self.auth_claim;
        let trees = self.trees.read();
        Ok(AuthClaimProofs {
            claim,
            inclusion: trees.proof(TreeKind::Claims, &claim.hi())?,
            non_revocation: trees.proof(TreeKind::Revocation, &claim.revocation_nonce().to_hash())?,
            snapshot: IdentitySnapshot {
                state: trees.state(),
                roots: trees.roots(),
            },
        })
    }
}

fn genesis_trees(
    key: &Ed25519PublicKey,
    config: &TreeConfig,
) -> Result<(IdentityTrees, CoreClaim), StateError> {
    let auth_claim = auth_claim(key)?;
    let mut trees = IdentityTrees::new(config.max_levels);
    trees.insert_claim(&auth_claim)?;
    Ok((trees, auth_claim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkid_claim::{ClaimData, ClaimDescriptor, ClaimOptions, DataSlots, SchemaHash};
    use zkid_crypto::Ed25519KeyPair;

    fn identity(seed: u8) -> ManagedIdentity {
        let kp = Ed25519KeyPair::from_seed(&[seed; 32]);
        ManagedIdentity::create(&kp.public_key(), &TreeConfig::default()).unwrap()
    }

    fn claim(n: u64) -> CoreClaim {
        let mut options = ClaimOptions::new();
        options.revocation_nonce = RevocationNonce(n);
        CoreClaim::encode(&ClaimDescriptor {
            schema_hash: SchemaHash([2u8; 16]),
            subject: None,
            data: ClaimData::Flat(DataSlots {
                value_a: Hash::from_u64(n),
                index_a: Hash::from_u64(n),
                ..Default::default()
            }),
            options,
        })
        .unwrap()
    }

    #[test]
    fn genesis_derivation_is_deterministic() {
        let a = identity(1);
        let b = identity(1);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.did(), b.did());
        assert_eq!(a.did().identity_id().unwrap(), a.id());
        let kp = Ed25519KeyPair::from_seed(&[1u8; 32]);
        assert_eq!(&ManagedIdentity::derive_did(&kp.public_key(), &TreeConfig::default()).unwrap(), a.did());
        assert_ne!(identity(2).id(), a.id());
    }

    #[test]
    fn state_matches_roots_after_each_mutation() {
        let id = identity(3);
        assert_eq!(id.state(), id.genesis_state());
        let s1 = id.insert_claim(&claim(10)).unwrap();
        assert_eq!(s1.state, s1.roots.state());
        let s2 = id.revoke(RevocationNonce(10)).unwrap();
        assert_ne!(s1.state, s2.state);
        let s3 = id.publish_roots().unwrap();
        assert_eq!(id.snapshot(), s3);
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let id = identity(4);
        id.insert_claim(&claim(1)).unwrap();
        let before = id.snapshot();
        let err = id
            .apply("batch", |trees| {
                trees.insert_claim(&claim(2))?;
                trees.insert_claim(&claim(1))
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Tree { tree: TreeKind::Claims, .. }));
        assert_eq!(id.snapshot(), before);
        assert!(id.claim(&claim(2).hi()).is_none());
    }

    #[test]
    fn inclusion_and_not_found() {
        let id = identity(5);
        let c = claim(7);
        id.insert_claim(&c).unwrap();
        let proof = id.claim_proof(&c).unwrap();
        assert!(proof.proof.verify(&proof.tree_root(), &c.hi(), &c.hv()));
        assert!(matches!(
            id.claim_proof(&claim(8)),
            Err(StateError::NotFound { tree: TreeKind::Claims, .. })
        ));
    }

    #[test]
    fn revocation_flips_non_revocation_proof() {
        let id = identity(6);
        let nonce = RevocationNonce(99);
        let before = id.revocation_proof(nonce).unwrap();
        assert!(!before.proof.existence);
        assert!(before.proof.verify(&before.tree_root(), &nonce.to_hash(), &Hash::ZERO));

        id.revoke(nonce).unwrap();
        let after = id.revocation_proof(nonce).unwrap();
        assert!(after.proof.existence);
        assert!(after.proof.verify(&after.tree_root(), &nonce.to_hash(), &Hash::ZERO));
        assert!(matches!(
            id.prove_non_inclusion(TreeKind::Revocation, &nonce.to_hash()),
            Err(StateError::AlreadyPresent { .. })
        ));
        assert!(id.is_revoked(nonce));
    }

    #[test]
    fn non_inclusion_aux_branches() {
        let id = identity(7);
        // Empty revocation tree: path ends at an empty node.
        let empty = id
            .prove_non_inclusion(TreeKind::Revocation, &Hash::from_u64(2))
            .unwrap();
        assert!(empty.proof.no_aux());

        // A single occupied leaf: any other key lands on it.
        id.revoke(RevocationNonce(1)).unwrap();
        let occupied = id
            .prove_non_inclusion(TreeKind::Revocation, &Hash::from_u64(3))
            .unwrap();
        assert!(!occupied.proof.no_aux());
        assert_eq!(occupied.proof.aux_hi(), Hash::from_u64(1));
        assert_eq!(occupied.proof.aux_hv(), Hash::ZERO);
    }

    #[test]
    fn auth_claim_proofs_track_revocation() {
        let id = identity(9);
        let proofs = id.auth_claim_proofs().unwrap();
        assert!(proofs.is_valid());
        assert_eq!(proofs.snapshot, id.snapshot());
        assert!(proofs
            .inclusion
            .verify(&proofs.snapshot.roots.claims_root, &proofs.claim.hi(), &proofs.claim.hv()));

        id.revoke(id.auth_claim().revocation_nonce()).unwrap();
        assert!(!id.auth_claim_proofs().unwrap().is_valid());
    }

    #[test]
    fn concurrent_mutations_serialize() {
        let id = identity(8);
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let id = id.clone();
                std::thread::spawn(move || {
                    for n in 0..16u64 {
                        id.insert_claim(&claim(1000 + t * 100 + n)).unwrap();
                        let snap = id.snapshot();
                        assert_eq!(snap.state, snap.roots.state());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 128 inserted plus the auth claim.
        assert_eq!(id.claims().len(), 129);
    }

    mod prop {
        use super::*;
        use proptest::collection::btree_set;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn proofs_hold_against_the_snapshot_they_carry(
                claims in btree_set(1u64..10_000, 1..12),
                revoked in btree_set(1u64..10_000, 0..6),
            ) {
                let id = identity(11);
                for n in &claims {
                    id.insert_claim(&claim(*n)).unwrap();
                }
                for n in &revoked {
                    id.revoke(RevocationNonce(*n)).unwrap();
                }
                let snap = id.snapshot();
                prop_assert_eq!(snap.state, snap.roots.state());
                for n in &claims {
                    let c = claim(*n);
                    let p = id.claim_proof(&c).unwrap();
                    prop_assert_eq!(&p.snapshot, &snap);
                    prop_assert!(p.proof.verify(&snap.roots.claims_root, &c.hi(), &c.hv()));

                    let r = id.revocation_proof(RevocationNonce(*n)).unwrap();
                    prop_assert_eq!(r.proof.existence, revoked.contains(n));
                    prop_assert!(r.proof.verify(&snap.roots.revocation_root, &RevocationNonce(*n).to_hash(), &Hash::ZERO));
                }
            }
        }
    }
}
