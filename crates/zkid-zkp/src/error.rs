//! Prover and query errors.

use thiserror::Error;
use zkid_claim::ClaimError;
use zkid_core::{ProofError, ValidationError, ZkidError};

/// Error reported by a [`Prover`](crate::traits::Prover).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// Artifacts do not belong to the witness's circuit, or are unusable.
    #[error("circuit error: {0}")]
    Circuit(String),
    /// The witness does not satisfy the circuit.
    #[error("witness error: {0}")]
    Witness(String),
    /// Internal prover failure.
    #[error("prover error: {0}")]
    Prover(String),
    /// The prover output could not be parsed.
    #[error("malformed prover output: {0}")]
    MalformedOutput(String),
}

impl From<ProverError> for ProofError {
    fn from(err: ProverError) -> Self {
        ProofError::ProofGenerationFailed(err.to_string())
    }
}

/// Error building a circuit query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Arity or operand validation failed. Arity violations carry
    /// [`ValidationError::QueryArity`].
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An operand could not be encoded.
    #[error("query value: {0}")]
    Value(#[from] ClaimError),

    /// Operator symbol or code is not in the table.
    #[error("unknown query operator: {0}")]
    UnknownOperator(String),

    /// The request query object has the wrong shape.
    #[error("malformed query: {0}")]
    Malformed(String),
}

impl QueryError {
    /// Whether this is an arity violation.
    pub fn is_arity(&self) -> bool {
        matches!(self, QueryError::Validation(ValidationError::QueryArity { .. }))
    }
}

impl From<QueryError> for ZkidError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Validation(v) => ZkidError::Validation(v),
            QueryError::Value(c) => c.into(),
            other => ZkidError::Validation(ValidationError::InvalidField {
                field: "query".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}
