//! # Prover Interface
//!
//! The proving engine is a black box: `(witness, artifacts) → (proof,
//! public signals)`. Implementations must use fresh randomness on every
//! call; a proof is never memoized or reused.
//!
//! `prove` is synchronous and CPU-bound. Async callers run it on a blocking
//! task (`tokio::task::spawn_blocking`), which is why the trait requires
//! `Send + Sync`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zkid_core::ValidationError;

use crate::error::ProverError;

// ---------------------------------------------------------------------------
// Circuits
// ---------------------------------------------------------------------------

/// The fixed set of circuits this workspace prepares witnesses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CircuitId {
    /// Proof of control of an identity.
    #[serde(rename = "authV2")]
    AuthV2,
    /// Query over a credential carrying an issuer signature.
    #[serde(rename = "credentialAtomicQuerySigV2")]
    AtomicQuerySigV2,
    /// Query over a credential anchored in the issuer's claims tree.
    #[serde(rename = "credentialAtomicQueryMTPV2")]
    AtomicQueryMtpV2,
}

impl CircuitId {
    /// All circuits.
    pub const ALL: [CircuitId; 3] = [CircuitId::AuthV2, CircuitId::AtomicQuerySigV2, CircuitId::AtomicQueryMtpV2];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitId::AuthV2 => "authV2",
            CircuitId::AtomicQuerySigV2 => "credentialAtomicQuerySigV2",
            CircuitId::AtomicQueryMtpV2 => "credentialAtomicQueryMTPV2",
        }
    }

    /// Whether the circuit proves a credential query.
    pub fn is_query(&self) -> bool {
        !matches!(self, CircuitId::AuthV2)
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidField {
                field: "circuitId".to_string(),
                reason: format!("unsupported circuit {s:?}"),
            })
    }
}

/// Compiled circuit and proving key.
#[derive(Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    /// Circuit the artifacts belong to.
    pub circuit: CircuitId,
    /// Witness-calculator program.
    pub program: Vec<u8>,
    /// Proving key.
    pub proving_key: Vec<u8>,
}

impl fmt::Debug for CircuitArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitArtifacts")
            .field("circuit", &self.circuit)
            .field("program_len", &self.program.len())
            .field("proving_key_len", &self.proving_key.len())
            .finish()
    }
}

/// File name of the witness program inside a circuit directory.
pub const PROGRAM_FILE: &str = "circuit.wasm";
/// File name of the proving key inside a circuit directory.
pub const PROVING_KEY_FILE: &str = "circuit_final.zkey";

/// Artifacts for several circuits.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<CircuitId, Arc<CircuitArtifacts>>,
}

impl ArtifactSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace artifacts.
    pub fn insert(&mut self, artifacts: CircuitArtifacts) {
        self.artifacts.insert(artifacts.circuit, Arc::new(artifacts));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, artifacts: CircuitArtifacts) -> Self {
        self.insert(artifacts);
        self
    }

    /// Artifacts for `circuit`.
    pub fn get(&self, circuit: CircuitId) -> Result<Arc<CircuitArtifacts>, ProverError> {
        self.artifacts
            .get(&circuit)
            .cloned()
            .ok_or_else(|| ProverError::Circuit(format!("no artifacts loaded for {circuit}")))
    }

    /// Load every circuit found under `dir`, laid out as
    /// `<dir>/<circuit id>/{circuit.wasm, circuit_final.zkey}`. Missing
    /// circuit directories are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, ProverError> {
        let mut set = Self::new();
        for circuit in CircuitId::ALL {
            let base = dir.join(circuit.as_str());
            if !base.is_dir() {
                continue;
            }
            let read = |name: &str| {
                std::fs::read(base.join(name))
                    .map_err(|e| ProverError::Circuit(format!("{circuit}: cannot read {name}: {e}")))
            };
            set.insert(CircuitArtifacts {
                circuit,
                program: read(PROGRAM_FILE)?,
                proving_key: read(PROVING_KEY_FILE)?,
            });
            tracing::debug!(circuit = %circuit, dir = %base.display(), "circuit artifacts loaded");
        }
        Ok(set)
    }

    /// Circuits with artifacts.
    pub fn circuits(&self) -> impl Iterator<Item = CircuitId> + '_ {
        self.artifacts.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Witness and proof
// ---------------------------------------------------------------------------

/// Full set of circuit inputs, keyed by signal name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Witness {
    /// Circuit the inputs are for.
    pub circuit: CircuitId,
    /// Signal name → value (string, or array of strings).
    pub inputs: Map<String, Value>,
}

impl Witness {
    /// Serialize `inputs` (a struct with one field per signal) into a
    /// witness for `circuit`.
    pub fn new(circuit: CircuitId, inputs: &impl Serialize) -> Result<Self, ProverError> {
        match serde_json::to_value(inputs) {
            Ok(Value::Object(inputs)) => Ok(Self { circuit, inputs }),
            Ok(other) => Err(ProverError::Witness(format!("witness must be an object, got {other}"))),
            Err(e) => Err(ProverError::Witness(e.to_string())),
        }
    }

    /// A single input as a string.
    pub fn input_str(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).and_then(Value::as_str)
    }
}

/// The `(pi_a, pi_b, pi_c)` triple with its protocol and curve tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofTriple {
    /// G1 point `a`.
    pub pi_a: Vec<String>,
    /// G2 point `b`.
    pub pi_b: Vec<Vec<String>>,
    /// G1 point `c`.
    pub pi_c: Vec<String>,
    /// Proof protocol, e.g. `groth16`.
    pub protocol: String,
    /// Curve, e.g. `bn128`.
    pub curve: String,
}

/// Prover output: the proof and the ordered public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    /// Proof triple.
    pub proof: ProofTriple,
    /// Public signals in circuit order.
    pub pub_signals: Vec<String>,
}

impl ZkProof {
    /// Parse raw prover output of the form
    /// `{"proof": {...}, "pub_signals": [...]}`.
    pub fn from_json(raw: &str) -> Result<Self, ProverError> {
        let proof: ZkProof = serde_json::from_str(raw).map_err(|e| ProverError::MalformedOutput(e.to_string()))?;
        if proof.proof.pi_a.is_empty() || proof.proof.pi_b.is_empty() || proof.proof.pi_c.is_empty() {
            return Err(ProverError::MalformedOutput("empty proof point".to_string()));
        }
        Ok(proof)
    }
}

/// A proving engine.
pub trait Prover: Send + Sync {
    /// Produce a proof for `witness` with `artifacts`.
    fn prove(&self, witness: &Witness, artifacts: &CircuitArtifacts) -> Result<ZkProof, ProverError>;
}

impl<P: Prover + ?Sized> Prover for Arc<P> {
    fn prove(&self, witness: &Witness, artifacts: &CircuitArtifacts) -> Result<ZkProof, ProverError> {
        (**self).prove(witness, artifacts)
    }
}
