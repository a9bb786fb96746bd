//! # zkid-core: Foundational Types
//!
//! Every other zkid crate depends on this one; it depends on nothing
//! internal.
//!
//! - [`Hash`]: the 32-byte value carried by claim slots, tree nodes and
//!   public signals.
//! - [`Did`], [`IdentityId`], [`RequestId`]: identifier newtypes with
//!   validated constructors.
//! - [`Timestamp`]: UTC, whole seconds.
//! - [`CanonicalBytes`]: the only route from JSON to hashed bytes.
//! - [`error`]: the shared error taxonomy.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod error;
pub mod hash;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use error::{
    CanonicalizationError, CryptoError, ProofError, TransportError, ValidationError, ZkidError,
};
pub use hash::Hash;
pub use identity::{Did, IdentityId, RequestId, DID_METHOD, ID_TYPE_ED25519, IDENTITY_ID_LEN};
pub use temporal::Timestamp;
