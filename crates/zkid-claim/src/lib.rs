//! # zkid-claim: Core Claim Codec
//!
//! Encodes attestable facts into fixed-layout [`CoreClaim`]s and back.
//!
//! - [`codec`]: slot layout, header flags, [`CoreClaim::encode`] and
//!   [`CoreClaim::decode`].
//! - [`value`]: JSON attribute to slot value, with a configurable
//!   [`DecimalScale`].
//! - [`merklize`]: secondary payload trees for merklized claims.
//! - [`nonce`]: CSPRNG revocation nonces.
//! - [`auth`]: the auth claim binding an identity's Ed25519 key.

pub mod auth;
pub mod codec;
pub mod error;
pub mod merklize;
pub mod nonce;
pub mod value;

pub use auth::{auth_claim, auth_claim_key, auth_claim_nonce, AUTH_SCHEMA_HASH};
pub use codec::{
    ClaimData, ClaimDescriptor, ClaimOptions, CoreClaim, DataSlots, MerklizedRootPosition, SchemaHash,
    SubjectPosition,
};
pub use error::ClaimError;
pub use merklize::{path_key, MerklizedPayload, Merklizer, PAYLOAD_TREE_LEVELS};
pub use nonce::RevocationNonce;
pub use value::{encode_value, DecimalScale};
