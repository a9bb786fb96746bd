//! # Field Hash
//!
//! `Hash` is the 32-byte value that fills every claim slot, tree node and
//! public signal. Integers are stored little-endian in the low bytes, which
//! keeps small values readable in hex dumps and lets `from_u64`/`to_u64`
//! round-trip for the revocation nonce and the authentication challenge.
//!
//! Serialized as a 64-char lowercase hex string.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A 32-byte hash or field slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero value. Empty tree nodes and unused slots hash to this.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode an integer little-endian into the low 8 bytes.
    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; 32];
        out[..8].copy_from_slice(&value.to_le_bytes());
        Self(out)
    }

    /// Decode the low 8 bytes as a little-endian integer.
    ///
    /// Returns `None` if any of the upper 24 bytes are non-zero.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[8..].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[..8]);
        Some(u64::from_le_bytes(low))
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true for [`Hash::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Bit `n` of the value, little-endian bit order (bit 0 is the low bit
    /// of byte 0). Used to walk sparse Merkle tree paths.
    pub fn bit(&self, n: usize) -> bool {
        if n >= 256 {
            return false;
        }
        (self.0[n / 8] >> (n % 8)) & 1 == 1
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char hex string.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let raw = hex::decode(s.trim())
            .map_err(|e| ValidationError::InvalidHash(format!("{s:?}: {e}")))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            ValidationError::InvalidHash(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
