//! Claim codec errors.

use thiserror::Error;
use zkid_core::{CanonicalizationError, ValidationError, ZkidError};
use zkid_crypto::TreeError;

/// Errors from encoding, decoding or merklizing claims.
#[derive(Error, Debug)]
pub enum ClaimError {
    /// Header bits name a position or flag that does not exist.
    #[error("invalid claim header: {0}")]
    InvalidHeader(String),

    /// A slot or byte range that must be zero carries data.
    #[error("reserved bytes in slot {slot} are not zero")]
    NonZeroReserved {
        /// Slot name, e.g. `i1` or `v0[16..32]`.
        slot: &'static str,
    },

    /// Subject id and subject position disagree.
    #[error("subject mismatch: {0}")]
    SubjectMismatch(String),

    /// Payload kind and merklized-root position disagree.
    #[error("data mismatch: {0}")]
    DataMismatch(String),

    /// An attribute value cannot be encoded into a slot.
    #[error("cannot encode attribute `{path}`: {reason}")]
    UnsupportedValue {
        /// Attribute path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Flat encoding has room for four attributes.
    #[error("flat claims hold at most 4 attributes, got {0}; use a merklized claim")]
    TooManyAttributes(usize),

    /// Identifier validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Canonicalization failed while hashing a value.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Merklization tree failure.
    #[error("merklization failed: {0}")]
    Tree(#[from] TreeError),
}

impl From<ClaimError> for ZkidError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Validation(v) => ZkidError::Validation(v),
            ClaimError::Canonicalization(c) => ZkidError::Canonicalization(c),
            ClaimError::Tree(t) => t.into(),
            other => ZkidError::Validation(ValidationError::InvalidField {
                field: "claim".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}
