//! # Identity Identifiers
//!
//! Newtype wrappers for the identifiers that flow through zkid. You cannot
//! pass an [`IdentityId`] where a [`Did`] string is expected, nor a bare
//! UUID where a [`RequestId`] is expected.
//!
//! ## Identity id layout
//!
//! An [`IdentityId`] is 31 bytes:
//!
//! | bytes  | content                                        |
//! |--------|------------------------------------------------|
//! | 0..2   | identity type                                  |
//! | 2..29  | low 27 bytes of the genesis state              |
//! | 29..31 | checksum: wrapping sum of bytes 0..29, u16 LE  |
//!
//! It is rendered base58 inside a DID: `did:zkid:<network>:<base58>`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::hash::Hash;

/// DID method used for identities created by this crate family.
pub const DID_METHOD: &str = "zkid";

/// Identity type for Ed25519-controlled identities.
pub const ID_TYPE_ED25519: [u8; 2] = [0x00, 0x01];

/// Byte length of an [`IdentityId`].
pub const IDENTITY_ID_LEN: usize = 31;

// ---------------------------------------------------------------------------
// Did
// ---------------------------------------------------------------------------

/// A W3C Decentralized Identifier.
///
/// Any method is accepted (verifier DIDs come from other networks); only
/// `did:zkid:` DIDs can be resolved to an [`IdentityId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Create a DID from a string, validating format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let rest = s
            .strip_prefix("did:")
            .ok_or_else(|| ValidationError::InvalidDid(s.to_string()))?;
        let (method, identifier) = rest
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidDid(s.to_string()))?;

        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }
        if identifier.is_empty() || identifier.ends_with(':') {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }
        Ok(())
    }

    /// Build the DID of an identity on `network`.
    pub fn from_identity(network: &str, id: &IdentityId) -> Result<Self, ValidationError> {
        if network.is_empty()
            || !network
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidField {
                field: "network".to_string(),
                reason: format!("{network:?} must be lowercase alphanumeric or '-'"),
            });
        }
        Self::new(format!("did:{DID_METHOD}:{network}:{}", id.to_base58()))
    }

    /// Access the DID string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DID method (between the first and second colons).
    pub fn method(&self) -> &str {
        self.0[4..].split(':').next().unwrap_or_default()
    }

    /// Everything after `did:<method>:`.
    pub fn method_specific_id(&self) -> &str {
        self.0[4..].split_once(':').map(|(_, id)| id).unwrap_or_default()
    }

    /// Resolve a `did:zkid:<network>:<base58>` DID to its identity id.
    pub fn identity_id(&self) -> Result<IdentityId, ValidationError> {
        if self.method() != DID_METHOD {
            return Err(ValidationError::InvalidDid(format!(
                "{} is not a {DID_METHOD} DID",
                self.0
            )));
        }
        let encoded = self.0.rsplit(':').next().unwrap_or_default();
        IdentityId::from_base58(encoded)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl std::str::FromStr for Did {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// IdentityId
// ---------------------------------------------------------------------------

/// Stable identifier of an identity, derived once from its genesis state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId([u8; IDENTITY_ID_LEN]);

impl IdentityId {
    /// Derive the identifier from an identity type and genesis state.
    pub fn from_genesis(id_type: [u8; 2], genesis_state: &Hash) -> Self {
        let mut out = [0u8; IDENTITY_ID_LEN];
        out[..2].copy_from_slice(&id_type);
        out[2..29].copy_from_slice(&genesis_state.as_bytes()[..27]);
        let checksum = checksum(&out[..29]);
        out[29..].copy_from_slice(&checksum.to_le_bytes());
        Self(out)
    }

    /// Parse raw bytes, checking the checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let raw: [u8; IDENTITY_ID_LEN] = bytes.try_into().map_err(|_| {
            ValidationError::InvalidIdentityId(format!(
                "expected {IDENTITY_ID_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        let expected = checksum(&raw[..29]);
        let actual = u16::from_le_bytes([raw[29], raw[30]]);
        if expected != actual {
            return Err(ValidationError::InvalidIdentityId(format!(
                "checksum mismatch: expected {expected:#06x}, got {actual:#06x}"
            )));
        }
        Ok(Self(raw))
    }

    /// Parse the base58 form used inside DIDs.
    pub fn from_base58(s: &str) -> Result<Self, ValidationError> {
        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|e| ValidationError::InvalidIdentityId(format!("{s:?}: {e}")))?;
        Self::from_bytes(&raw)
    }

    /// Base58 rendering.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Identity type prefix.
    pub fn id_type(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_ID_LEN] {
        &self.0
    }

    /// The identifier as a claim slot value (zero-padded to 32 bytes).
    pub fn to_hash(&self) -> Hash {
        let mut out = [0u8; 32];
        out[..IDENTITY_ID_LEN].copy_from_slice(&self.0);
        Hash::from_bytes(out)
    }

    /// Recover an identifier stored in a claim slot.
    pub fn from_hash(h: &Hash) -> Result<Self, ValidationError> {
        if h.as_bytes()[IDENTITY_ID_LEN] != 0 {
            return Err(ValidationError::InvalidIdentityId(
                "slot has a non-zero high byte".to_string(),
            ));
        }
        Self::from_bytes(&h.as_bytes()[..IDENTITY_ID_LEN])
    }
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({})", self.to_base58())
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Serialize for IdentityId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for IdentityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        IdentityId::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Unique identifier of a credential request or protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new random request identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
