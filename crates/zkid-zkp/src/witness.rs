//! # Witness Assembly
//!
//! Typed inputs of the auth circuit and their conversion into a
//! [`Witness`]. Query circuits additionally take [`CredentialInputs`]: the
//! issuer's claim, its non-revocation proof, the issuer's proof of the
//! claim, and for merklized claims the attribute's path proof.
//!
//! Sibling paths are padded with zeros to the circuit's fixed depth; a proof
//! deeper than the circuit is rejected.
//!
//! Signal encoding: hashes and ids are lowercase hex of their 32-byte slot,
//! integers are decimal strings, flags are `"0"` / `"1"`.

use serde_json::{json, Map, Value};
use zkid_claim::{CoreClaim, PAYLOAD_TREE_LEVELS};
use zkid_core::{Hash, IdentityId};
use zkid_crypto::{Ed25519Signature, MerkleProof, DEFAULT_MAX_LEVELS};

use crate::error::ProverError;
use crate::query::{CircuitQuery, Operator};
use crate::traits::{CircuitId, Witness};

/// Depth of the identity trees in the auth circuit.
pub const IDENTITY_TREE_DEPTH: usize = DEFAULT_MAX_LEVELS;

/// Depth of the global state tree in the auth circuit.
pub const GIST_DEPTH: usize = 64;

/// Depth of the payload tree of a merklized claim.
pub const CLAIM_PATH_DEPTH: usize = PAYLOAD_TREE_LEVELS;

/// Everything the auth circuit needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInputs {
    /// Holder's genesis id.
    pub genesis_id: IdentityId,
    /// Profile nonce; zero for the genesis profile.
    pub profile_nonce: u64,
    /// Holder state.
    pub state: Hash,
    /// Claims-tree root.
    pub claims_tree_root: Hash,
    /// Revocation-tree root.
    pub rev_tree_root: Hash,
    /// Roots-tree root.
    pub roots_tree_root: Hash,
    /// The holder's auth claim.
    pub auth_claim: CoreClaim,
    /// Inclusion of the auth claim in the claims tree.
    pub auth_claim_inc_mtp: MerkleProof,
    /// Non-inclusion of the auth claim's nonce in the revocation tree.
    pub auth_claim_non_rev_mtp: MerkleProof,
    /// The challenge, signed as the integer it is.
    pub challenge: u64,
    /// Signature over [`Hash::from_u64`] of the challenge.
    pub challenge_signature: Ed25519Signature,
    /// Global state tree root.
    pub gist_root: Hash,
    /// Proof of the holder's entry (or its absence) in the global state tree.
    pub gist_mtp: MerkleProof,
}

fn hex(h: &Hash) -> Value {
    json!(h.to_hex())
}

fn flag(b: bool) -> Value {
    json!(if b { "1" } else { "0" })
}

fn path(name: &str, proof: &MerkleProof, depth: usize) -> Result<Value, ProverError> {
    if proof.siblings.len() > depth {
        return Err(ProverError::Witness(format!(
            "{name} has {} siblings, circuit depth is {depth}",
            proof.siblings.len()
        )));
    }
    Ok(Value::Array(proof.siblings_padded(depth).iter().map(hex).collect()))
}

fn aux(map: &mut Map<String, Value>, prefix: &str, proof: &MerkleProof) {
    map.insert(format!("{prefix}AuxHi"), hex(&proof.aux_hi()));
    map.insert(format!("{prefix}AuxHv"), hex(&proof.aux_hv()));
    map.insert(format!("{prefix}NoAux"), flag(proof.no_aux()));
}

impl AuthInputs {
    /// Circuit signal map.
    pub fn signals(&self) -> Result<Map<String, Value>, ProverError> {
        let mut m = Map::new();
        m.insert("genesisID".to_string(), hex(&self.genesis_id.to_hash()));
        m.insert("profileNonce".to_string(), json!(self.profile_nonce.to_string()));
        m.insert("state".to_string(), hex(&self.state));
        m.insert("claimsTreeRoot".to_string(), hex(&self.claims_tree_root));
        m.insert("revTreeRoot".to_string(), hex(&self.rev_tree_root));
        m.insert("rootsTreeRoot".to_string(), hex(&self.roots_tree_root));
        m.insert(
            "authClaim".to_string(),
            Value::Array(self.auth_claim.slots().iter().map(hex).collect()),
        );
        m.insert(
            "authClaimIncMtp".to_string(),
            path("authClaimIncMtp", &self.auth_claim_inc_mtp, IDENTITY_TREE_DEPTH)?,
        );
        m.insert(
            "authClaimNonRevMtp".to_string(),
            path("authClaimNonRevMtp", &self.auth_claim_non_rev_mtp, IDENTITY_TREE_DEPTH)?,
        );
        aux(&mut m, "authClaimNonRevMtp", &self.auth_claim_non_rev_mtp);
        m.insert("challenge".to_string(), json!(self.challenge.to_string()));
        m.insert("challengeSignature".to_string(), json!(self.challenge_signature.to_hex()));
        m.insert("gistRoot".to_string(), hex(&self.gist_root));
        m.insert("gistMtp".to_string(), path("gistMtp", &self.gist_mtp, GIST_DEPTH)?);
        aux(&mut m, "gistMtp", &self.gist_mtp);
        Ok(m)
    }

    /// Auth-circuit witness.
    pub fn witness(&self) -> Result<Witness, ProverError> {
        Witness::new(CircuitId::AuthV2, &self.signals()?)
    }

    /// Witness for a query circuit: the auth inputs, the credential inputs
    /// and the query signals.
    pub fn query_witness(
        &self,
        circuit: CircuitId,
        query: &CircuitQuery,
        credential: &CredentialInputs,
    ) -> Result<Witness, ProverError> {
        if !circuit.is_query() {
            return Err(ProverError::Circuit(format!("{circuit} does not take a query")));
        }
        let mut m = self.signals()?;
        m.extend(credential.signals(circuit, query)?);
        m.extend(query.signals());
        Witness::new(circuit, &m)
    }
}

/// An issuer state and the roots it commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerState {
    /// State digest.
    pub state: Hash,
    /// Claims-tree root.
    pub claims_tree_root: Hash,
    /// Revocation-tree root.
    pub rev_tree_root: Hash,
    /// Roots-tree root.
    pub roots_tree_root: Hash,
}

impl IssuerState {
    fn insert(&self, map: &mut Map<String, Value>, prefix: &str) {
        map.insert(format!("{prefix}State"), hex(&self.state));
        map.insert(format!("{prefix}ClaimsTreeRoot"), hex(&self.claims_tree_root));
        map.insert(format!("{prefix}RevTreeRoot"), hex(&self.rev_tree_root));
        map.insert(format!("{prefix}RootsTreeRoot"), hex(&self.roots_tree_root));
    }
}

/// How the issuer vouches for the credential claim. Selects the query
/// circuit: signatures go to `credentialAtomicQuerySigV2`, tree inclusion to
/// `credentialAtomicQueryMTPV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuerProofInputs {
    /// Signature over the claim by a key bound through the issuer's auth
    /// claim.
    Signature {
        /// The issuer's auth claim.
        auth_claim: CoreClaim,
        /// Inclusion of the auth claim in the issuer's claims tree.
        auth_claim_mtp: MerkleProof,
        /// Issuer state the auth-claim proof is against.
        auth_state: IssuerState,
        /// Signature over the claim commitment.
        signature: Ed25519Signature,
    },
    /// Inclusion of the claim in the issuer's claims tree.
    Mtp {
        /// Claims-tree proof.
        claim_mtp: MerkleProof,
        /// Issuer state the proof is against.
        claim_state: IssuerState,
    },
}

impl IssuerProofInputs {
    /// The query circuit that consumes this proof.
    pub fn circuit(&self) -> CircuitId {
        match self {
            IssuerProofInputs::Signature { .. } => CircuitId::AtomicQuerySigV2,
            IssuerProofInputs::Mtp { .. } => CircuitId::AtomicQueryMtpV2,
        }
    }
}

/// An attribute of a merklized claim, proven against the payload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklizedValue {
    /// Payload root carried by the claim.
    pub root: Hash,
    /// Tree key of the attribute path.
    pub path_key: Hash,
    /// Encoded attribute value; `None` with a non-membership proof.
    pub value: Option<Hash>,
    /// Payload-tree proof for `path_key`.
    pub mtp: MerkleProof,
}

/// Credential-side inputs of the query circuits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInputs {
    /// Issuer identity.
    pub issuer_id: IdentityId,
    /// The credential's core claim.
    pub claim: CoreClaim,
    /// Non-inclusion of the claim's nonce in the issuer's revocation tree.
    pub non_rev_mtp: MerkleProof,
    /// Issuer state the non-revocation proof is against.
    pub non_rev_state: IssuerState,
    /// The issuer's proof of the claim.
    pub issuer_proof: IssuerProofInputs,
    /// Attribute proof, for merklized claims.
    pub merklized: Option<MerklizedValue>,
}

impl CredentialInputs {
    /// Signals for `circuit` answering `query`.
    pub fn signals(&self, circuit: CircuitId, query: &CircuitQuery) -> Result<Map<String, Value>, ProverError> {
        if self.issuer_proof.circuit() != circuit {
            return Err(ProverError::Circuit(format!(
                "{circuit} cannot consume a proof for {}",
                self.issuer_proof.circuit()
            )));
        }
        let mut m = Map::new();
        m.insert("issuerID".to_string(), hex(&self.issuer_id.to_hash()));
        m.insert(
            "issuerClaim".to_string(),
            Value::Array(self.claim.slots().iter().map(hex).collect()),
        );
        m.insert(
            "issuerClaimNonRevMtp".to_string(),
            path("issuerClaimNonRevMtp", &self.non_rev_mtp, IDENTITY_TREE_DEPTH)?,
        );
        aux(&mut m, "issuerClaimNonRevMtp", &self.non_rev_mtp);
        self.non_rev_state.insert(&mut m, "issuerClaimNonRev");

        match &self.issuer_proof {
            IssuerProofInputs::Signature {
                auth_claim,
                auth_claim_mtp,
                auth_state,
                signature,
            } => {
                m.insert(
                    "issuerAuthClaim".to_string(),
                    Value::Array(auth_claim.slots().iter().map(hex).collect()),
                );
                m.insert(
                    "issuerAuthClaimMtp".to_string(),
                    path("issuerAuthClaimMtp", auth_claim_mtp, IDENTITY_TREE_DEPTH)?,
                );
                auth_state.insert(&mut m, "issuerAuth");
                m.insert("issuerClaimSignature".to_string(), json!(signature.to_hex()));
            }
            IssuerProofInputs::Mtp { claim_mtp, claim_state } => {
                m.insert(
                    "issuerClaimMtp".to_string(),
                    path("issuerClaimMtp", claim_mtp, IDENTITY_TREE_DEPTH)?,
                );
                claim_state.insert(&mut m, "issuerClaimIden");
            }
        }

        m.insert("isMerklized".to_string(), flag(self.merklized.is_some()));
        let empty = MerkleProof::default();
        let (mtp, value, missing) = match &self.merklized {
            Some(v) => {
                if query.operator != Operator::Noop && v.path_key != query.claim_path_key {
                    return Err(ProverError::Witness(
                        "attribute proof is for a different path than the query".to_string(),
                    ));
                }
                (&v.mtp, v.value.unwrap_or(Hash::ZERO), v.value.is_none())
            }
            None => (&empty, Hash::ZERO, false),
        };
        m.insert("claimPathMtp".to_string(), path("claimPathMtp", mtp, CLAIM_PATH_DEPTH)?);
        aux(&mut m, "claimPathMtp", mtp);
        m.insert("claimPathNotExists".to_string(), flag(missing));
        m.insert("claimPathValue".to_string(), hex(&value));
        Ok(m)
    }
}

/// Public signals of the auth circuit, in circuit order:
/// `[userID, challenge, gistRoot]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPublicSignals {
    /// Proven identity.
    pub user_id: IdentityId,
    /// Challenge the proof answers.
    pub challenge: u64,
    /// Global state root the proof is against.
    pub gist_root: Hash,
}

impl AuthPublicSignals {
    /// Parse prover output.
    pub fn parse(signals: &[String]) -> Result<Self, ProverError> {
        let [user_id, challenge, gist_root] = signals else {
            return Err(ProverError::MalformedOutput(format!(
                "auth circuit has 3 public signals, got {}",
                signals.len()
            )));
        };
        let malformed = |what: &str, e: String| ProverError::MalformedOutput(format!("{what}: {e}"));
        let user_hash = Hash::from_hex(user_id).map_err(|e| malformed("userID", e.to_string()))?;
        Ok(Self {
            user_id: IdentityId::from_hash(&user_hash).map_err(|e| malformed("userID", e.to_string()))?,
            challenge: challenge.parse().map_err(|e| malformed("challenge", format!("{e}")))?,
            gist_root: Hash::from_hex(gist_root).map_err(|e| malformed("gistRoot", e.to_string()))?,
        })
    }

    /// Ordered signal strings.
    pub fn to_signals(&self) -> Vec<String> {
        vec![
            self.user_id.to_hash().to_hex(),
            self.challenge.to_string(),
            self.gist_root.to_hex(),
        ]
    }
}
