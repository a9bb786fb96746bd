//! # zkid-cli: zkid Command-Line Interface
//!
//! ## Subcommands
//!
//! - `key`: Ed25519 seed generation and inspection
//! - `identity`: genesis DID, id and tree roots of a key
//! - `claim`: core claim encode and decode
//! - `credential`: credential issuance and verification
//! - `query`: selective-disclosure query validation
//!
//! Handlers delegate to the domain crates and return a process exit code.

pub mod claim;
pub mod credential;
pub mod identity;
pub mod keys;
pub mod query;
