//! Auth claims.
//!
//! Every identity's genesis claims tree holds exactly one auth claim binding
//! its Ed25519 public key (`i2`). The nonce is derived from the key so that
//! the genesis state, and therefore the identity id, is a pure function of
//! the key.

use zkid_core::Hash;
use zkid_crypto::{hash_elems, Ed25519PublicKey};

use crate::codec::{
    ClaimData, ClaimDescriptor, ClaimOptions, CoreClaim, DataSlots, MerklizedRootPosition, SchemaHash,
    SubjectPosition,
};
use crate::error::ClaimError;
use crate::nonce::RevocationNonce;

/// Schema hash of Ed25519 auth claims.
pub const AUTH_SCHEMA_HASH: SchemaHash = SchemaHash([
    0x7a, 0x4d, 0x2b, 0x1e, 0x90, 0x55, 0xc3, 0x08, 0xe1, 0x6f, 0xa4, 0x37, 0xd2, 0x0b, 0x59, 0xc6,
]);

/// Deterministic revocation nonce of the auth claim for `key`.
pub fn auth_claim_nonce(key: &Ed25519PublicKey) -> RevocationNonce {
    let digest = hash_elems(&[key.to_hash()]);
    let mut low = [0u8; 4];
    low.copy_from_slice(&digest.as_bytes()[..4]);
    RevocationNonce(u64::from(u32::from_le_bytes(low)))
}

/// Auth claim for `key`.
pub fn auth_claim(key: &Ed25519PublicKey) -> Result<CoreClaim, ClaimError> {
    CoreClaim::encode(&ClaimDescriptor {
        schema_hash: AUTH_SCHEMA_HASH,
        subject: None,
        data: ClaimData::Flat(DataSlots {
            index_a: key.to_hash(),
            ..Default::default()
        }),
        options: ClaimOptions {
            subject_position: SubjectPosition::None,
            merklized_position: MerklizedRootPosition::None,
            updatable: false,
            version: 0,
            revocation_nonce: auth_claim_nonce(key),
            expiration: None,
        },
    })
}

/// Public key bound by an auth claim, if `claim` is one.
pub fn auth_claim_key(claim: &CoreClaim) -> Option<Ed25519PublicKey> {
    if claim.schema_hash() != AUTH_SCHEMA_HASH || claim.index[2] == Hash::ZERO {
        return None;
    }
    Some(Ed25519PublicKey::from_bytes(*claim.index[2].as_bytes()))
}
