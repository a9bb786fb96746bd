//! Proof-kind policy: which proof an issuer attaches per credential type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zkid_core::ValidationError;

use crate::credential::ProofKind;

/// Maps credential types to the proof kind they are issued with.
///
/// Types without an entry cannot be issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofPolicy {
    kinds: BTreeMap<String, ProofKind>,
}

impl ProofPolicy {
    /// An empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, schema_type: impl Into<String>, kind: ProofKind) -> Self {
        self.set(schema_type, kind);
        self
    }

    /// Issue `schema_type` credentials with `kind`.
    pub fn set(&mut self, schema_type: impl Into<String>, kind: ProofKind) {
        self.kinds.insert(schema_type.into(), kind);
    }

    /// The proof kind for `schema_type`.
    pub fn kind_for(&self, schema_type: &str) -> Result<ProofKind, ValidationError> {
        self.kinds
            .get(schema_type)
            .copied()
            .ok_or_else(|| ValidationError::UnknownCredentialType(schema_type.to_string()))
    }

    /// Credential types with an entry.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}
