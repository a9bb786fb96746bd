//! Identity state errors.

use thiserror::Error;
use zkid_claim::ClaimError;
use zkid_core::{Did, Hash, ValidationError, ZkidError};
use zkid_crypto::TreeError;

use crate::trees::TreeKind;

/// Errors from identity state operations.
#[derive(Error, Debug)]
pub enum StateError {
    /// Inclusion was requested for an absent key.
    #[error("key {key} not found in {tree} tree")]
    NotFound {
        /// Tree searched.
        tree: TreeKind,
        /// Missing key.
        key: Hash,
    },

    /// Non-inclusion was requested for a present key.
    #[error("key {key} is present in {tree} tree")]
    AlreadyPresent {
        /// Tree searched.
        tree: TreeKind,
        /// Present key.
        key: Hash,
    },

    /// A tree operation failed.
    #[error("{tree} tree: {source}")]
    Tree {
        /// Tree mutated.
        tree: TreeKind,
        /// Underlying failure.
        #[source]
        source: TreeError,
    },

    /// The global state tree rejected an update.
    #[error("global state tree: {0}")]
    Gist(#[source] TreeError),

    /// No identity is registered under the DID.
    #[error("unknown identity {0}")]
    UnknownIdentity(Did),

    /// An identity with the same id is already registered.
    #[error("identity {0} is already registered")]
    DuplicateIdentity(Did),

    /// Claim encoding failed.
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Identifier validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StateError {
    pub(crate) fn tree(tree: TreeKind) -> impl FnOnce(TreeError) -> StateError {
        move |source| StateError::Tree { tree, source }
    }
}

impl From<StateError> for ZkidError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Tree { source, .. } | StateError::Gist(source) => source.into(),
            StateError::Claim(c) => c.into(),
            StateError::Validation(v) => v.into(),
            other => ZkidError::Validation(ValidationError::InvalidField {
                field: "identity".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}
