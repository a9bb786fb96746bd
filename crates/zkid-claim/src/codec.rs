//! # Core Claim Codec
//!
//! A core claim is eight 32-byte slots: the index part `i0..i3` and the
//! value part `v0..v3`. The claims tree stores `hi = H(i0..i3)` as key and
//! `hv = H(v0..v3)` as value, so two claims with the same index cannot
//! coexist in one tree.
//!
//! ## Layout
//!
//! | slot | bytes   | content                                           |
//! |------|---------|---------------------------------------------------|
//! | i0   | 0..16   | schema hash                                       |
//! | i0   | 16..20  | header flags, u32 LE                              |
//! | i0   | 20..24  | version, u32 LE                                   |
//! | i1   | all     | subject id when the subject position is `Index`   |
//! | i2   | all     | index data, or merklized root at `Index`          |
//! | i3   | all     | index data                                        |
//! | v0   | 0..8    | revocation nonce, u64 LE                          |
//! | v0   | 8..16   | expiration, i64 LE unix seconds                   |
//! | v1   | all     | subject id when the subject position is `Value`   |
//! | v2   | all     | value data, or merklized root at `Value`          |
//! | v3   | all     | value data                                        |
//!
//! All other bytes are zero; [`CoreClaim::decode`] rejects claims where they
//! are not.
//!
//! ## Header flags
//!
//! | bits | meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0..3 | subject position: `000` self, `010` index, `011` value    |
//! | 3    | expiration present                                        |
//! | 4    | updatable                                                 |
//! | 5..8 | merklized root position: `0` none, `1` index, `2` value   |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zkid_core::{CanonicalBytes, Hash, IdentityId, Timestamp};
use zkid_crypto::{hash_canonical, hash_elems};

use crate::error::ClaimError;
use crate::nonce::RevocationNonce;
use crate::value::{encode_value, DecimalScale};

const SUBJECT_MASK: u32 = 0b111;
const SUBJECT_SELF: u32 = 0b000;
const SUBJECT_INDEX: u32 = 0b010;
const SUBJECT_VALUE: u32 = 0b011;
const FLAG_EXPIRATION: u32 = 1 << 3;
const FLAG_UPDATABLE: u32 = 1 << 4;
const MERKLIZED_SHIFT: u32 = 5;
const MERKLIZED_MASK: u32 = 0b111 << MERKLIZED_SHIFT;
const KNOWN_BITS: u32 = SUBJECT_MASK | FLAG_EXPIRATION | FLAG_UPDATABLE | MERKLIZED_MASK;

// ---------------------------------------------------------------------------
// Schema hash
// ---------------------------------------------------------------------------

/// 16-byte identifier of a credential schema.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SchemaHash(pub [u8; 16]);

impl SchemaHash {
    /// Derive the schema hash of `<context_url>#<schema_type>`.
    pub fn from_type(context_url: &str, schema_type: &str) -> Result<Self, ClaimError> {
        let id = format!("{context_url}#{schema_type}");
        let digest = hash_canonical(&CanonicalBytes::new(&id)?);
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest.as_bytes()[..16]);
        Ok(Self(out))
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaHash({})", self.to_hex())
    }
}

impl fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SchemaHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SchemaHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| serde::de::Error::custom("schema hash must be 16 bytes"))?;
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// Positions and options
// ---------------------------------------------------------------------------

/// Where the subject identity is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectPosition {
    /// The claim is about the identity holding it ("self"); no subject slot.
    #[serde(rename = "self")]
    None,
    /// Subject id in `i1`.
    Index,
    /// Subject id in `v1`.
    Value,
}

/// Where the root of a merklized payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerklizedRootPosition {
    /// Flat payload.
    None,
    /// Root in `i2`.
    Index,
    /// Root in `v2`.
    Value,
}

/// Header and `v0` settings of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOptions {
    /// Subject slot.
    pub subject_position: SubjectPosition,
    /// Merklized root slot.
    pub merklized_position: MerklizedRootPosition,
    /// Whether the claim may be superseded.
    pub updatable: bool,
    /// Claim version.
    pub version: u32,
    /// Revocation nonce.
    pub revocation_nonce: RevocationNonce,
    /// Expiration instant.
    pub expiration: Option<Timestamp>,
}

impl ClaimOptions {
    /// Self-subject, flat, non-updatable, version 0, with a random nonce.
    pub fn new() -> Self {
        Self {
            subject_position: SubjectPosition::None,
            merklized_position: MerklizedRootPosition::None,
            updatable: false,
            version: 0,
            revocation_nonce: RevocationNonce::random(),
            expiration: None,
        }
    }
}

impl Default for ClaimOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The four data slots of a flat claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataSlots {
    /// `i2`
    pub index_a: Hash,
    /// `i3`
    pub index_b: Hash,
    /// `v2`
    pub value_a: Hash,
    /// `v3`
    pub value_b: Hash,
}

impl DataSlots {
    /// Map a credential subject onto the four slots.
    ///
    /// Attributes other than `id` are taken in key order and written to
    /// `i2, i3, v2, v3`. More than four attributes do not fit.
    pub fn from_subject(subject: &Value, scale: DecimalScale) -> Result<Self, ClaimError> {
        let Value::Object(map) = subject else {
            return Err(ClaimError::UnsupportedValue {
                path: "credentialSubject".to_string(),
                reason: "must be a JSON object".to_string(),
            });
        };
        let attrs: BTreeMap<&String, &Value> = map.iter().filter(|(k, _)| k.as_str() != "id").collect();
        if attrs.len() > 4 {
            return Err(ClaimError::TooManyAttributes(attrs.len()));
        }
        let mut slots = [Hash::ZERO; 4];
        for (slot, (key, value)) in slots.iter_mut().zip(attrs) {
            *slot = encode_value(key, value, scale)?;
        }
        Ok(Self {
            index_a: slots[0],
            index_b: slots[1],
            value_a: slots[2],
            value_b: slots[3],
        })
    }
}

/// Payload of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ClaimData {
    /// Attributes written directly into the data slots.
    Flat(DataSlots),
    /// Root of a merklized payload.
    Merklized(Hash),
}

/// The decoded form of a [`CoreClaim`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDescriptor {
    /// Credential schema.
    pub schema_hash: SchemaHash,
    /// Subject identity, present iff the subject position is not `None`.
    pub subject: Option<IdentityId>,
    /// Payload.
    pub data: ClaimData,
    /// Header and `v0` settings.
    pub options: ClaimOptions,
}

// ---------------------------------------------------------------------------
// CoreClaim
// ---------------------------------------------------------------------------

/// A fixed-layout claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoreClaim {
    /// `i0..i3`
    pub index: [Hash; 4],
    /// `v0..v3`
    pub value: [Hash; 4],
}

impl CoreClaim {
    /// Encode a descriptor.
    pub fn encode(desc: &ClaimDescriptor) -> Result<Self, ClaimError> {
        let opts = &desc.options;
        let mut index = [Hash::ZERO; 4];
        let mut value = [Hash::ZERO; 4];

        let mut flags = match opts.subject_position {
            SubjectPosition::None => SUBJECT_SELF,
            SubjectPosition::Index => SUBJECT_INDEX,
            SubjectPosition::Value => SUBJECT_VALUE,
        };
        if opts.expiration.is_some() {
            flags |= FLAG_EXPIRATION;
        }
        if opts.updatable {
            flags |= FLAG_UPDATABLE;
        }
        flags |= match opts.merklized_position {
            MerklizedRootPosition::None => 0,
            MerklizedRootPosition::Index => 1,
            MerklizedRootPosition::Value => 2,
        } << MERKLIZED_SHIFT;

        let mut i0 = [0u8; 32];
        i0[..16].copy_from_slice(&desc.schema_hash.0);
        i0[16..20].copy_from_slice(&flags.to_le_bytes());
        i0[20..24].copy_from_slice(&opts.version.to_le_bytes());
        index[0] = Hash::from_bytes(i0);

        match (opts.subject_position, desc.subject) {
            (SubjectPosition::None, None) => {}
            (SubjectPosition::Index, Some(id)) => index[1] = id.to_hash(),
            (SubjectPosition::Value, Some(id)) => value[1] = id.to_hash(),
            (SubjectPosition::None, Some(_)) => {
                return Err(ClaimError::SubjectMismatch(
                    "self claims carry no subject id".to_string(),
                ))
            }
            (pos, None) => {
                return Err(ClaimError::SubjectMismatch(format!(
                    "subject position {pos:?} requires a subject id"
                )))
            }
        }

        match (opts.merklized_position, desc.data) {
            (MerklizedRootPosition::None, ClaimData::Flat(slots)) => {
                index[2] = slots.index_a;
                index[3] = slots.index_b;
                value[2] = slots.value_a;
                value[3] = slots.value_b;
            }
            (MerklizedRootPosition::Index, ClaimData::Merklized(root)) => index[2] = root,
            (MerklizedRootPosition::Value, ClaimData::Merklized(root)) => value[2] = root,
            (MerklizedRootPosition::None, ClaimData::Merklized(_)) => {
                return Err(ClaimError::DataMismatch(
                    "merklized payload needs a root position".to_string(),
                ))
            }
            (pos, ClaimData::Flat(_)) => {
                return Err(ClaimError::DataMismatch(format!(
                    "root position {pos:?} requires a merklized payload"
                )))
            }
        }

        let mut v0 = [0u8; 32];
        v0[..8].copy_from_slice(&opts.revocation_nonce.0.to_le_bytes());
        if let Some(exp) = opts.expiration {
            v0[8..16].copy_from_slice(&exp.epoch_secs().to_le_bytes());
        }
        value[0] = Hash::from_bytes(v0);

        Ok(Self { index, value })
    }

    /// Decode into a descriptor. Exact inverse of [`CoreClaim::encode`].
    pub fn decode(&self) -> Result<ClaimDescriptor, ClaimError> {
        let i0 = self.index[0].as_bytes();
        if i0[24..].iter().any(|b| *b != 0) {
            return Err(ClaimError::NonZeroReserved { slot: "i0[24..32]" });
        }
        let flags = self.header_flags();
        if flags & !KNOWN_BITS != 0 {
            return Err(ClaimError::InvalidHeader(format!("unknown flag bits {flags:#010x}")));
        }

        let subject_position = match flags & SUBJECT_MASK {
            SUBJECT_SELF => SubjectPosition::None,
            SUBJECT_INDEX => SubjectPosition::Index,
            SUBJECT_VALUE => SubjectPosition::Value,
            other => {
                return Err(ClaimError::InvalidHeader(format!("subject position bits {other:03b}")))
            }
        };
        let merklized_position = match (flags & MERKLIZED_MASK) >> MERKLIZED_SHIFT {
            0 => MerklizedRootPosition::None,
            1 => MerklizedRootPosition::Index,
            2 => MerklizedRootPosition::Value,
            other => {
                return Err(ClaimError::InvalidHeader(format!("merklized position {other}")))
            }
        };

        let subject = match subject_position {
            SubjectPosition::None => {
                require_zero(&self.index[1], "i1")?;
                require_zero(&self.value[1], "v1")?;
                None
            }
            SubjectPosition::Index => {
                require_zero(&self.value[1], "v1")?;
                Some(IdentityId::from_hash(&self.index[1])?)
            }
            SubjectPosition::Value => {
                require_zero(&self.index[1], "i1")?;
                Some(IdentityId::from_hash(&self.value[1])?)
            }
        };

        let data = match merklized_position {
            MerklizedRootPosition::None => ClaimData::Flat(DataSlots {
                index_a: self.index[2],
                index_b: self.index[3],
                value_a: self.value[2],
                value_b: self.value[3],
            }),
            MerklizedRootPosition::Index => {
                require_zero(&self.index[3], "i3")?;
                require_zero(&self.value[2], "v2")?;
                require_zero(&self.value[3], "v3")?;
                ClaimData::Merklized(self.index[2])
            }
            MerklizedRootPosition::Value => {
                require_zero(&self.index[2], "i2")?;
                require_zero(&self.index[3], "i3")?;
                require_zero(&self.value[3], "v3")?;
                ClaimData::Merklized(self.value[2])
            }
        };

        let v0 = self.value[0].as_bytes();
        if v0[16..].iter().any(|b| *b != 0) {
            return Err(ClaimError::NonZeroReserved { slot: "v0[16..32]" });
        }
        let expiration_secs = i64::from_le_bytes(read8(&v0[8..16]));
        let expiration = if flags & FLAG_EXPIRATION != 0 {
            Some(Timestamp::from_epoch_secs(expiration_secs)?)
        } else if expiration_secs != 0 {
            return Err(ClaimError::NonZeroReserved { slot: "v0[8..16]" });
        } else {
            None
        };

        let mut schema = [0u8; 16];
        schema.copy_from_slice(&i0[..16]);

        Ok(ClaimDescriptor {
            schema_hash: SchemaHash(schema),
            subject,
            data,
            options: ClaimOptions {
                subject_position,
                merklized_position,
                updatable: flags & FLAG_UPDATABLE != 0,
                version: u32::from_le_bytes(read4(&i0[20..24])),
                revocation_nonce: RevocationNonce(u64::from_le_bytes(read8(&v0[..8]))),
                expiration,
            },
        })
    }

    /// Raw header flags from `i0`.
    pub fn header_flags(&self) -> u32 {
        u32::from_le_bytes(read4(&self.index[0].as_bytes()[16..20]))
    }

    /// Schema hash from `i0`.
    pub fn schema_hash(&self) -> SchemaHash {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.index[0].as_bytes()[..16]);
        SchemaHash(out)
    }

    /// Revocation nonce from `v0`.
    pub fn revocation_nonce(&self) -> RevocationNonce {
        RevocationNonce(u64::from_le_bytes(read8(&self.value[0].as_bytes()[..8])))
    }

    /// Claims-tree key: `H(i0, i1, i2, i3)`.
    pub fn hi(&self) -> Hash {
        hash_elems(&self.index)
    }

    /// Claims-tree value: `H(v0, v1, v2, v3)`.
    pub fn hv(&self) -> Hash {
        hash_elems(&self.value)
    }

    /// Commitment to the whole claim, `H(hi, hv)`. Issuers sign this.
    pub fn hash(&self) -> Hash {
        hash_elems(&[self.hi(), self.hv()])
    }

    /// All eight slots, index part first.
    pub fn slots(&self) -> [Hash; 8] {
        let mut out = [Hash::ZERO; 8];
        out[..4].copy_from_slice(&self.index);
        out[4..].copy_from_slice(&self.value);
        out
    }
}

fn require_zero(slot: &Hash, name: &'static str) -> Result<(), ClaimError> {
    if slot.is_zero() {
        Ok(())
    } else {
        Err(ClaimError::NonZeroReserved { slot: name })
    }
}

fn read4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[..4]);
    out
}

fn read8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}
