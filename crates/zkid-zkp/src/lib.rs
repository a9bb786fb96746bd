//! # zkid-zkp: Prover Seam and Query Builder
//!
//! The workspace never implements a proof system. It prepares inputs for a
//! fixed set of circuits and parses what the prover returns.
//!
//! - [`traits`]: [`Prover`], [`CircuitId`], [`CircuitArtifacts`], the proof
//!   triple and public signals.
//! - [`witness`]: typed auth and credential circuit inputs and public signals.
//! - [`query`]: the selective-disclosure operator table, arity validation
//!   and decimal scaling.
//! - [`mock`]: a transparent prover for tests (feature `mock`, on by
//!   default).

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod query;
pub mod traits;
pub mod witness;

pub use error::{ProverError, QueryError};
#[cfg(feature = "mock")]
pub use mock::MockProver;
pub use query::{Arity, CircuitQuery, DecimalScale, Operator, Query, QueryBuilder, MAX_VALUE_ARITY};
pub use traits::{ArtifactSet, CircuitArtifacts, CircuitId, ProofTriple, Prover, Witness, ZkProof};
pub use witness::{
    AuthInputs, AuthPublicSignals, CredentialInputs, IssuerProofInputs, IssuerState, MerklizedValue, CLAIM_PATH_DEPTH,
    GIST_DEPTH, IDENTITY_TREE_DEPTH,
};
