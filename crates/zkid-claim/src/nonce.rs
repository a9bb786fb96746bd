//! Revocation nonces.
//!
//! A nonce is drawn uniformly from the 32-bit space by the OS CSPRNG and
//! stored in the low bytes of `v0`. Revoking a claim inserts its nonce into
//! the issuer's revocation tree.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zkid_core::Hash;

/// Per-claim revocation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevocationNonce(pub u64);

impl RevocationNonce {
    /// A fresh nonce from `OsRng`.
    pub fn random() -> Self {
        Self(u64::from(rand::rngs::OsRng.next_u32()))
    }

    /// The nonce as a revocation-tree key.
    pub fn to_hash(&self) -> Hash {
        Hash::from_u64(self.0)
    }

    /// Raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevocationNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RevocationNonce {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
