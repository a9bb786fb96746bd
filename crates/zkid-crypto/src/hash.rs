//! # Domain-Separated SHA-256
//!
//! Every hash in zkid is SHA-256 over a one-byte domain tag followed by the
//! inputs, so a leaf can never be confused with an inner node or a claim
//! commitment:
//!
//! | tag    | function          | input                          |
//! |--------|-------------------|--------------------------------|
//! | `0x00` | [`hash_leaf`]     | `key ‖ value`                  |
//! | `0x01` | [`hash_node`]     | `left ‖ right`                 |
//! | `0x02` | [`hash_elems`]    | `count (u64 LE) ‖ e0 ‖ e1 ‖ …` |
//! | `0x03` | [`hash_canonical`]| canonical JSON bytes           |
//!
//! Empty subtrees are [`Hash::ZERO`] and are never hashed.

use sha2::{Digest, Sha256};
use zkid_core::{CanonicalBytes, Hash};

const TAG_LEAF: u8 = 0x00;
const TAG_NODE: u8 = 0x01;
const TAG_ELEMS: u8 = 0x02;
const TAG_CANONICAL: u8 = 0x03;

fn tagged(tag: u8, parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Hash::from_bytes(out)
}

/// Leaf hash: `SHA256(0x00 ‖ key ‖ value)`.
pub fn hash_leaf(key: &Hash, value: &Hash) -> Hash {
    tagged(TAG_LEAF, &[key.as_bytes(), value.as_bytes()])
}

/// Inner node hash: `SHA256(0x01 ‖ left ‖ right)`.
pub fn hash_node(left: &Hash, right: &Hash) -> Hash {
    tagged(TAG_NODE, &[left.as_bytes(), right.as_bytes()])
}

/// Hash of an ordered list of field elements. The element count is part of
/// the input, so `[a]` and `[a, 0]` differ.
pub fn hash_elems(elems: &[Hash]) -> Hash {
    let count = (elems.len() as u64).to_le_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(elems.len() + 1);
    parts.push(&count);
    parts.extend(elems.iter().map(|e| e.as_bytes().as_slice()));
    tagged(TAG_ELEMS, &parts)
}

/// Hash of canonicalized JSON.
pub fn hash_canonical(data: &CanonicalBytes) -> Hash {
    tagged(TAG_CANONICAL, &[data.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_separated() {
        let a = Hash::from_u64(1);
        let b = Hash::from_u64(2);
        assert_ne!(hash_leaf(&a, &b), hash_node(&a, &b));
        assert_ne!(hash_node(&a, &b), hash_elems(&[a, b]));
    }

    #[test]
    fn node_hash_is_ordered() {
        let a = Hash::from_u64(1);
        let b = Hash::from_u64(2);
        assert_ne!(hash_node(&a, &b), hash_node(&b, &a));
    }

    #[test]
    fn elems_length_matters() {
        let a = Hash::from_u64(5);
        assert_ne!(hash_elems(&[a]), hash_elems(&[a, Hash::ZERO]));
    }

    #[test]
    fn elems_count_is_not_truncated() {
        let elems = vec![Hash::from_u64(3); 257];
        let mut hasher = Sha256::new();
        hasher.update([TAG_ELEMS]);
        hasher.update(257u64.to_le_bytes());
        for e in &elems {
            hasher.update(e.as_bytes());
        }
        let mut expected = [0u8; 32];
        expected.copy_from_slice(&hasher.finalize());
        assert_eq!(hash_elems(&elems), Hash::from_bytes(expected));
    }

    #[test]
    fn canonical_hash_ignores_key_order() {
        let x = CanonicalBytes::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
        let y = CanonicalBytes::new(&serde_json::json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(hash_canonical(&x), hash_canonical(&y));
    }

    #[test]
    fn leaf_hash_is_deterministic() {
        let k = Hash::from_u64(10);
        let v = Hash::from_u64(20);
        assert_eq!(hash_leaf(&k, &v), hash_leaf(&k, &v));
        assert!(!hash_leaf(&k, &v).is_zero());
    }
}
