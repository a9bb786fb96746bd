//! Authentication session errors.

use thiserror::Error;
use zkid_core::{CryptoError, ProofError, TransportError, ValidationError, ZkidError};
use zkid_zkp::QueryError;

use crate::state::SessionState;

/// Errors from session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The operation is not valid in the current state.
    #[error("cannot {operation} in state {state}")]
    InvalidTransition {
        /// Current state.
        state: SessionState,
        /// Attempted operation.
        operation: &'static str,
    },

    /// A state change that is not an edge of the state graph.
    #[error("illegal state change {from} -> {to}")]
    IllegalTransition {
        /// State before.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// The proof flow failed.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// The verifier exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The bearer token could not be refreshed.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Request input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request query is invalid.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A signature or key failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<ZkidError> for SessionError {
    fn from(err: ZkidError) -> Self {
        match err {
            ZkidError::Validation(v) => SessionError::Validation(v),
            ZkidError::Crypto(c) => SessionError::Crypto(c),
            ZkidError::Proof(p) => SessionError::Proof(p),
            ZkidError::Transport(t) => SessionError::Transport(t),
            ZkidError::AuthExpired(m) => SessionError::AuthExpired(m),
            ZkidError::Canonicalization(c) => SessionError::Validation(ValidationError::InvalidField {
                field: "message".to_string(),
                reason: c.to_string(),
            }),
        }
    }
}

impl From<SessionError> for ZkidError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Proof(p) => ZkidError::Proof(p),
            SessionError::Transport(t) => ZkidError::Transport(t),
            SessionError::AuthExpired(m) => ZkidError::AuthExpired(m),
            SessionError::Validation(v) => ZkidError::Validation(v),
            SessionError::Query(q) => q.into(),
            SessionError::Crypto(c) => ZkidError::Crypto(c),
            other @ (SessionError::InvalidTransition { .. } | SessionError::IllegalTransition { .. }) => {
                ZkidError::Validation(ValidationError::InvalidField {
                    field: "session".to_string(),
                    reason: other.to_string(),
                })
            }
        }
    }
}

impl SessionError {
    /// The [`ProofError`], if this is one.
    pub fn as_proof_error(&self) -> Option<&ProofError> {
        match self {
            SessionError::Proof(p) => Some(p),
            _ => None,
        }
    }
}
