//! # Attribute Value Encoding
//!
//! Converts JSON attribute values into 32-byte slot values. The same
//! encoding is used for flat claim slots, merklized leaves and query values,
//! so a query compares like with like:
//!
//! - non-negative integers: little-endian [`Hash::from_u64`];
//! - booleans: `0` or `1`;
//! - decimals: scaled to an integer by [`DecimalScale`]
//!   (`1.5` at scale 3 becomes `1500`);
//! - strings: [`hash_canonical`] of the JSON string.
//!
//! Negative numbers, `null`, arrays and objects have no slot encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zkid_core::{CanonicalBytes, Hash};
use zkid_crypto::hash_canonical;

use crate::error::ClaimError;

/// Number of fractional decimal digits kept when encoding decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecimalScale(u32);

impl DecimalScale {
    /// Three fractional digits.
    pub const DEFAULT_DIGITS: u32 = 3;

    /// Largest supported scale; `10^18` is the largest power of ten in a u64.
    pub const MAX_DIGITS: u32 = 18;

    /// A scale of `digits` fractional digits.
    pub fn new(digits: u32) -> Result<Self, ClaimError> {
        if digits > Self::MAX_DIGITS {
            return Err(ClaimError::UnsupportedValue {
                path: "decimal_scale".to_string(),
                reason: format!("at most {} digits, got {digits}", Self::MAX_DIGITS),
            });
        }
        Ok(Self(digits))
    }

    /// Fractional digits.
    pub fn digits(&self) -> u32 {
        self.0
    }

    /// `10^digits`.
    pub fn factor(&self) -> u64 {
        10u64.pow(self.0)
    }

    /// Scale a decimal literal such as `"12.345"` to an integer.
    ///
    /// Excess fractional digits are an error, never truncated.
    pub fn scale_literal(&self, path: &str, literal: &str) -> Result<u64, ClaimError> {
        let unsupported = |reason: String| ClaimError::UnsupportedValue {
            path: path.to_string(),
            reason,
        };
        if literal.starts_with('-') {
            return Err(unsupported(format!("negative value {literal}")));
        }
        if literal.contains(|c: char| c == 'e' || c == 'E') {
            return Err(unsupported(format!("exponent notation {literal} is not supported")));
        }
        let (int_part, frac_part) = literal.split_once('.').unwrap_or((literal, ""));
        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.len() > self.0 as usize {
            return Err(unsupported(format!(
                "{literal} has more than {} fractional digits",
                self.0
            )));
        }
        let int_value: u64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|e| unsupported(format!("invalid number {literal}: {e}")))?
        };
        let frac_value: u64 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{frac_part:0<width$}", width = self.0 as usize);
            padded
                .parse()
                .map_err(|e| unsupported(format!("invalid number {literal}: {e}")))?
        };
        int_value
            .checked_mul(self.factor())
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| unsupported(format!("{literal} overflows at scale {}", self.0)))
    }
}

impl Default for DecimalScale {
    fn default() -> Self {
        Self(Self::DEFAULT_DIGITS)
    }
}

/// Encode one attribute value.
pub fn encode_value(path: &str, value: &Value, scale: DecimalScale) -> Result<Hash, ClaimError> {
    match value {
        Value::Bool(b) => Ok(Hash::from_u64(u64::from(*b))),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(Hash::from_u64(u))
            } else if n.is_i64() {
                Err(ClaimError::UnsupportedValue {
                    path: path.to_string(),
                    reason: format!("negative value {n}"),
                })
            } else {
                scale.scale_literal(path, &n.to_string()).map(Hash::from_u64)
            }
        }
        Value::String(_) => Ok(hash_canonical(&CanonicalBytes::new(value)?)),
        Value::Null => Err(ClaimError::UnsupportedValue {
            path: path.to_string(),
            reason: "null has no slot encoding".to_string(),
        }),
        Value::Array(_) | Value::Object(_) => Err(ClaimError::UnsupportedValue {
            path: path.to_string(),
            reason: "nested values require a merklized claim".to_string(),
        }),
    }
}
