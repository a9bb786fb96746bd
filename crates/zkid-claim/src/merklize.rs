//! # Payload Merklization
//!
//! Merklized claims carry a single root instead of attribute slots. Every
//! primitive value of the credential subject becomes a leaf of a secondary
//! sparse Merkle tree:
//!
//! - key: [`path_key`] of the dotted attribute path (`address.city`,
//!   `degrees.0.year`);
//! - value: [`encode_value`] of the attribute.
//!
//! A holder can then prove a single attribute, or its absence, against the
//! root embedded in the claim without revealing the rest of the document.

use std::collections::BTreeMap;

use serde_json::Value;
use zkid_core::{CanonicalBytes, Hash};
use zkid_crypto::{hash_canonical, MerkleProof, SparseMerkleTree};

use crate::error::ClaimError;
use crate::value::{encode_value, DecimalScale};

/// Depth of payload trees. Attribute keys are hashes, so collisions beyond
/// this depth are not a practical concern.
pub const PAYLOAD_TREE_LEVELS: usize = 64;

/// Tree key of an attribute path.
pub fn path_key(path: &str) -> Result<Hash, ClaimError> {
    Ok(hash_canonical(&CanonicalBytes::new(&path)?))
}

/// Builds payload trees from credential subjects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merklizer {
    scale: DecimalScale,
}

impl Merklizer {
    /// A merklizer encoding decimals at `scale`.
    pub fn new(scale: DecimalScale) -> Self {
        Self { scale }
    }

    /// Merklize a JSON object. `null` attributes are omitted.
    pub fn merklize(&self, subject: &Value) -> Result<MerklizedPayload, ClaimError> {
        if !subject.is_object() {
            return Err(ClaimError::UnsupportedValue {
                path: "credentialSubject".to_string(),
                reason: "must be a JSON object".to_string(),
            });
        }
        let mut entries = BTreeMap::new();
        flatten("", subject, &mut entries)?;

        let mut tree = SparseMerkleTree::new(PAYLOAD_TREE_LEVELS);
        let mut values = BTreeMap::new();
        for (path, value) in entries {
            let encoded = encode_value(&path, value, self.scale)?;
            tree.insert(path_key(&path)?, encoded)?;
            values.insert(path, encoded);
        }
        Ok(MerklizedPayload { tree, values })
    }
}

/// Dotted paths are not injective over keys that themselves contain dots,
/// so `{"a.b": 1}` and `{"a": {"b": 2}}` collide. A collision is an error.
fn flatten<'a>(prefix: &str, value: &'a Value, out: &mut BTreeMap<String, &'a Value>) -> Result<(), ClaimError> {
    let join = |segment: &str| {
        if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{prefix}.{segment}")
        }
    };
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&join(k), v, out)?;
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), v, out)?;
            }
        }
        Value::Null => {}
        primitive => {
            if out.insert(prefix.to_string(), primitive).is_some() {
                return Err(ClaimError::UnsupportedValue {
                    path: prefix.to_string(),
                    reason: "path is produced by more than one attribute".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// A merklized credential subject.
#[derive(Debug, Clone)]
pub struct MerklizedPayload {
    tree: SparseMerkleTree,
    values: BTreeMap<String, Hash>,
}

impl MerklizedPayload {
    /// Root to embed in the claim.
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Encoded value of an attribute path.
    pub fn value(&self, path: &str) -> Option<Hash> {
        self.values.get(path).copied()
    }

    /// Attribute paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Proof for `path`; a non-membership proof if the attribute is absent.
    pub fn prove(&self, path: &str) -> Result<(MerkleProof, Option<Hash>), ClaimError> {
        self.prove_key(&path_key(path)?)
    }

    /// Proof for an attribute by its tree key.
    pub fn prove_key(&self, key: &Hash) -> Result<(MerkleProof, Option<Hash>), ClaimError> {
        let proof = self.tree.generate_proof(key)?;
        let value = if proof.existence { Some(self.tree.get(key)?) } else { None };
        Ok((proof, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject() -> Value {
        json!({
            "id": "did:zkid:main:abc",
            "birthday": 19960424,
            "address": {"city": "Lisbon", "zip": null},
            "scores": [90, 85]
        })
    }

    #[test]
    fn flattens_nested_paths() {
        let payload = Merklizer::default().merklize(&subject()).unwrap();
        let paths: Vec<_> = payload.paths().collect();
        assert_eq!(paths, vec!["address.city", "birthday", "id", "scores.0", "scores.1"]);
        assert_eq!(payload.value("birthday"), Some(Hash::from_u64(19_960_424)));
        assert_eq!(payload.value("address.zip"), None);
    }

    #[test]
    fn root_is_key_order_independent() {
        let a = Merklizer::default().merklize(&json!({"a": 1, "b": "x"})).unwrap();
        let b = Merklizer::default().merklize(&json!({"b": "x", "a": 1})).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn root_changes_with_any_value() {
        let a = Merklizer::default().merklize(&json!({"a": 1})).unwrap();
        let b = Merklizer::default().merklize(&json!({"a": 2})).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn attribute_inclusion_and_absence() {
        let payload = Merklizer::default().merklize(&subject()).unwrap();
        let (proof, value) = payload.prove("birthday").unwrap();
        let value = value.unwrap();
        assert!(proof.existence);
        assert!(proof.verify(&payload.root(), &path_key("birthday").unwrap(), &value));

        let (absent, none) = payload.prove("nationality").unwrap();
        assert!(none.is_none());
        assert!(!absent.existence);
        assert!(absent.verify(&payload.root(), &path_key("nationality").unwrap(), &Hash::ZERO));

        let by_key = payload.prove_key(&path_key("address.city").unwrap()).unwrap();
        assert_eq!(by_key.1, payload.value("address.city"));
    }

    #[test]
    fn dotted_key_colliding_with_nested_path_is_rejected() {
        let err = Merklizer::default()
            .merklize(&json!({"a.b": 1, "a": {"b": 2}}))
            .unwrap_err();
        assert!(matches!(err, ClaimError::UnsupportedValue { ref path, .. } if path == "a.b"));
        let dotted = Merklizer::default().merklize(&json!({"a.b": 1})).unwrap();
        assert_eq!(dotted.value("a.b"), Some(Hash::from_u64(1)));
    }

    #[test]
    fn rejects_non_objects_and_bad_values() {
        assert!(Merklizer::default().merklize(&json!(5)).is_err());
        assert!(Merklizer::default().merklize(&json!({"debt": -5})).is_err());
    }
}
