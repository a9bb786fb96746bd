//! # zkid-vc: Credential Issuer
//!
//! - [`credential`]: [`CredentialDraft`], core-claim derivation, and the
//!   [`VerifiableCredential`] with its single [`CredentialProof`].
//! - [`policy`]: credential type → [`ProofKind`].
//! - [`issuer`]: [`CredentialIssuer`] (issue, revoke, status) and proof
//!   verification.

pub mod credential;
pub mod error;
pub mod issuer;
pub mod policy;

pub use credential::{
    create_credential, derive_core_claim, CredentialDraft, CredentialProof, CredentialRequest, CredentialSchema,
    CredentialStatus, MerkleTreeProof, ProofKind, SignatureProof, VerifiableCredential, SCHEMA_VALIDATOR_TYPE,
    VC_TYPE, W3C_CONTEXT,
};
pub use error::VcError;
pub use issuer::{sign, verify_credential, verify_signature, CredentialIssuer};
pub use policy::ProofPolicy;
