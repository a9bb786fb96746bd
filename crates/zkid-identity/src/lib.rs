//! # zkid-identity: Merkle State Manager
//!
//! Maintains the claims, revocation and roots trees of each identity, the
//! identity state digest derived from them, and the proofs other components
//! consume.
//!
//! - [`trees`]: the three trees and the state digest.
//! - [`manager`]: [`ManagedIdentity`], atomic mutation and consistent proofs.
//! - [`registry`]: DID → identity lookup.
//! - [`gist`]: the global state tree of published identity states.

pub mod error;
pub mod gist;
pub mod manager;
pub mod registry;
pub mod trees;

pub use error::StateError;
pub use gist::{gist_key, GistProof, GlobalStateTree, GIST_LEVELS};
pub use manager::{AuthClaimProofs, IdentitySnapshot, ManagedIdentity, TreeConfig, TreeProof};
pub use registry::IdentityRegistry;
pub use trees::{IdentityTrees, TreeKind, TreeRoots};
