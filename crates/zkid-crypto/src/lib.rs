//! # zkid-crypto: Cryptographic Primitives
//!
//! - [`hash`]: domain-separated SHA-256 over field elements and canonical
//!   JSON.
//! - [`ed25519`]: key pairs, signatures over 32-byte messages, verification.
//! - [`smt`]: sparse Merkle tree with inclusion and non-inclusion proofs.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - Private key material is never serialized or logged.

pub mod ed25519;
pub mod hash;
pub mod smt;

pub use ed25519::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use hash::{hash_canonical, hash_elems, hash_leaf, hash_node};
pub use smt::{MerkleProof, NodeAux, SparseMerkleTree, TreeError, DEFAULT_MAX_LEVELS};
