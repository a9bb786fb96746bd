//! Credential issuance errors.

use thiserror::Error;
use zkid_claim::ClaimError;
use zkid_core::{CryptoError, Did, ValidationError, ZkidError};
use zkid_identity::StateError;

/// Errors from drafting, issuing, revoking or verifying credentials.
#[derive(Error, Debug)]
pub enum VcError {
    /// Draft or credential input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Core claim derivation failed.
    #[error("core claim derivation failed: {0}")]
    Claim(#[from] ClaimError),

    /// The issuer's trees rejected the operation.
    #[error("issuer state: {0}")]
    State(#[from] StateError),

    /// Signature verification failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The credential names a different issuer.
    #[error("credential was issued by {actual}, not {expected}")]
    IssuerMismatch {
        /// This issuer's DID.
        expected: Did,
        /// Issuer DID on the credential.
        actual: Did,
    },

    /// The operation needs a signature proof.
    #[error("credential carries a Merkle proof, not a signature")]
    NotSignatureProof,

    /// The embedded core claim does not match the credential body.
    #[error("core claim does not match the credential: {0}")]
    ClaimMismatch(String),
}

impl From<VcError> for ZkidError {
    fn from(err: VcError) -> Self {
        match err {
            VcError::Validation(v) => ZkidError::Validation(v),
            VcError::Claim(c) => c.into(),
            VcError::State(s) => s.into(),
            VcError::Crypto(c) => ZkidError::Crypto(c),
            other => ZkidError::Validation(ValidationError::InvalidField {
                field: "credential".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}
