//! # Credential Issuer
//!
//! [`CredentialIssuer`] finalizes drafts for one issuer identity. The proof
//! kind comes from the [`ProofPolicy`]:
//!
//! - `Signature`: the issuer key signs `H(hi, hv)`. The proof embeds the key,
//!   the issuer's auth claim for it and that claim's inclusion proof, so a
//!   verifier can tie the key to the issuer's state.
//! - `MerkleTree`: the claim is inserted into the issuer's claims tree and
//!   the inclusion proof, taken against the post-insert state, is attached.
//!
//! Revocation inserts the credential's nonce into the issuer's revocation
//! tree.

use zkid_claim::{auth_claim_key, CoreClaim, DecimalScale};
use zkid_core::{CryptoError, Did, Timestamp};
use zkid_crypto::{verify, Ed25519KeyPair, Ed25519Signature};
use zkid_identity::{IdentitySnapshot, ManagedIdentity};

use crate::credential::{
    create_credential, derive_core_claim, CredentialDraft, CredentialProof, CredentialRequest,
    CredentialStatus, MerkleTreeProof, ProofKind, SignatureProof, VerifiableCredential,
};
use crate::error::VcError;
use crate::policy::ProofPolicy;

/// Sign a core claim: Ed25519 over `H(hi, hv)`.
pub fn sign(claim: &CoreClaim, key: &Ed25519KeyPair) -> Ed25519Signature {
    key.sign(&claim.hash())
}

/// Issues credentials on behalf of one managed identity.
#[derive(Debug)]
pub struct CredentialIssuer {
    identity: ManagedIdentity,
    key: Ed25519KeyPair,
    policy: ProofPolicy,
    scale: DecimalScale,
}

impl CredentialIssuer {
    /// An issuer for `identity`, signing with `key`.
    ///
    /// `key` must be the key of the identity's auth claim.
    pub fn new(identity: ManagedIdentity, key: Ed25519KeyPair, policy: ProofPolicy) -> Result<Self, VcError> {
        if auth_claim_key(identity.auth_claim()) != Some(key.public_key()) {
            return Err(CryptoError::KeyError(format!(
                "signing key is not the auth key of {}",
                identity.did()
            ))
            .into());
        }
        Ok(Self {
            identity,
            key,
            policy,
            scale: DecimalScale::default(),
        })
    }

    /// Use `scale` for decimal attributes.
    pub fn with_scale(mut self, scale: DecimalScale) -> Self {
        self.scale = scale;
        self
    }

    /// Issuer DID.
    pub fn did(&self) -> &Did {
        self.identity.did()
    }

    /// The issuer's identity.
    pub fn identity(&self) -> &ManagedIdentity {
        &self.identity
    }

    /// The proof-kind policy.
    pub fn policy(&self) -> &ProofPolicy {
        &self.policy
    }

    /// Draft a credential from this issuer.
    pub fn draft(&self, request: CredentialRequest) -> Result<CredentialDraft, VcError> {
        self.check_issuer(&request.issuer)?;
        create_credential(request)
    }

    /// Derive the core claim of `draft`, attach the proof its type calls
    /// for, and return the credential.
    pub fn issue(&self, draft: CredentialDraft, merklized: bool) -> Result<VerifiableCredential, VcError> {
        self.check_issuer(&draft.issuer)?;
        let kind = self.policy.kind_for(draft.schema_type())?;
        let claim = derive_core_claim(&draft, merklized, self.scale)?;

        let proof = match kind {
            ProofKind::Signature => {
                let auth_claim = *self.identity.auth_claim();
                CredentialProof::Signature(SignatureProof {
                    issuer_key: self.key.public_key(),
                    signature: sign(&claim, &self.key),
                    issuer_auth_claim: auth_claim,
                    issuer_auth_proof: self.identity.claim_proof(&auth_claim)?,
                })
            }
            ProofKind::MerkleTree => {
                self.identity.insert_claim(&claim)?;
                CredentialProof::MerkleProof(MerkleTreeProof {
                    claim_proof: self.identity.claim_proof(&claim)?,
                })
            }
        };

        tracing::info!(
            issuer = %draft.issuer,
            holder = %draft.holder,
            credential = %draft.id,
            schema_type = draft.schema_type(),
            kind = ?kind,
            "credential issued"
        );
        Ok(VerifiableCredential::new(draft, claim, proof))
    }

    /// Revoke a credential issued by this issuer.
    pub fn revoke(&self, credential: &VerifiableCredential) -> Result<IdentitySnapshot, VcError> {
        self.check_issuer(credential.issuer())?;
        let snapshot = self.identity.revoke(credential.revocation_nonce())?;
        tracing::info!(
            issuer = %credential.issuer(),
            credential = %credential.id(),
            nonce = %credential.revocation_nonce(),
            "credential revoked"
        );
        Ok(snapshot)
    }

    /// Revocation status of a credential issued by this issuer.
    pub fn status(&self, credential: &VerifiableCredential) -> Result<CredentialStatus, VcError> {
        self.check_issuer(credential.issuer())?;
        Ok(if self.identity.is_revoked(credential.revocation_nonce()) {
            CredentialStatus::Revoked
        } else {
            CredentialStatus::Active
        })
    }

    fn check_issuer(&self, issuer: &Did) -> Result<(), VcError> {
        if issuer != self.did() {
            return Err(VcError::IssuerMismatch {
                expected: self.did().clone(),
                actual: issuer.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a signature proof against the embedded key and claim.
///
/// Checks that the claim matches the credential body, that the signature
/// is valid over `H(hi, hv)`, that the auth claim binds the signing key,
/// and that the auth claim's inclusion proof holds.
pub fn verify_signature(credential: &VerifiableCredential) -> Result<(), VcError> {
    let CredentialProof::Signature(proof) = &credential.proof else {
        return Err(VcError::NotSignatureProof);
    };
    credential.check_claim_binding()?;
    verify(&credential.core_claim.hash(), &proof.signature, &proof.issuer_key)?;

    if auth_claim_key(&proof.issuer_auth_claim) != Some(proof.issuer_key) {
        return Err(CryptoError::VerificationFailed("auth claim does not bind the signing key".to_string()).into());
    }
    let auth = &proof.issuer_auth_proof;
    if !auth.proof.verify(
        &auth.tree_root(),
        &proof.issuer_auth_claim.hi(),
        &proof.issuer_auth_claim.hv(),
    ) || auth.snapshot.state != auth.snapshot.roots.state()
    {
        return Err(CryptoError::VerificationFailed("auth claim inclusion proof is invalid".to_string()).into());
    }
    Ok(())
}

/// Verify a credential's proof, whichever kind it is, and its expiration.
pub fn verify_credential(credential: &VerifiableCredential, now: Timestamp) -> Result<(), VcError> {
    if credential.is_expired(now) {
        return Err(CryptoError::VerificationFailed(format!("credential {} has expired", credential.id())).into());
    }
    match &credential.proof {
        CredentialProof::Signature(_) => verify_signature(credential),
        CredentialProof::MerkleProof(MerkleTreeProof { claim_proof }) => {
            credential.check_claim_binding()?;
            let claim = &credential.core_claim;
            if !claim_proof.proof.existence
                || !claim_proof.proof.verify(&claim_proof.tree_root(), &claim.hi(), &claim.hv())
                || claim_proof.snapshot.state != claim_proof.snapshot.roots.state()
            {
                return Err(CryptoError::VerificationFailed("claim inclusion proof is invalid".to_string()).into());
            }
            Ok(())
        }
    }
}
