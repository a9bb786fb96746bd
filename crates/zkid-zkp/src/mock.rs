//! # Mock Prover
//!
//! A transparent stand-in for the proving engine, used by tests and by the
//! CLI when no real backend is configured.
//!
//! It checks what it can without a circuit: the artifacts match the
//! witness's circuit, the challenge signature verifies against the key in
//! the auth claim, and query witnesses carry the credential inputs. It then
//! returns a proof triple of fresh random field strings. The public signals
//! are read back from the witness.
//!
//! **NOT A PROOF.** Anyone can produce this output. Never use it where a
//! verifier relies on soundness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use zkid_core::Hash;
use zkid_crypto::{verify, Ed25519PublicKey, Ed25519Signature};

use crate::error::ProverError;
use crate::traits::{CircuitArtifacts, CircuitId, ProofTriple, Prover, Witness, ZkProof};

/// Mock proving engine.
#[derive(Debug, Clone, Default)]
pub struct MockProver {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    failure: Option<ProverError>,
}

impl MockProver {
    /// A prover that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every `prove` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with `err`.
    pub fn failing(mut self, err: ProverError) -> Self {
        self.failure = Some(err);
        self
    }

    /// Number of `prove` calls so far, across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Artifacts for `circuit` with placeholder contents.
    pub fn artifacts(circuit: CircuitId) -> CircuitArtifacts {
        CircuitArtifacts {
            circuit,
            program: b"mock-program".to_vec(),
            proving_key: b"mock-proving-key".to_vec(),
        }
    }
}

fn random_field() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    Hash::from_bytes(bytes).to_hex()
}

fn input<'a>(witness: &'a Witness, name: &str) -> Result<&'a str, ProverError> {
    witness
        .input_str(name)
        .ok_or_else(|| ProverError::Witness(format!("missing input {name}")))
}

fn check_challenge_signature(witness: &Witness) -> Result<(), ProverError> {
    let challenge: u64 = input(witness, "challenge")?
        .parse()
        .map_err(|e| ProverError::Witness(format!("challenge: {e}")))?;
    let signature = Ed25519Signature::from_hex(input(witness, "challengeSignature")?)
        .map_err(|e| ProverError::Witness(e.to_string()))?;
    let key_slot = witness
        .inputs
        .get("authClaim")
        .and_then(|v| v.get(2))
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProverError::Witness("missing authClaim[2]".to_string()))?;
    let key_hash = Hash::from_hex(key_slot).map_err(|e| ProverError::Witness(e.to_string()))?;
    let key = Ed25519PublicKey::from_bytes(*key_hash.as_bytes());
    verify(&Hash::from_u64(challenge), &signature, &key)
        .map_err(|e| ProverError::Witness(format!("challenge signature: {e}")))
}

impl Prover for MockProver {
    fn prove(&self, witness: &Witness, artifacts: &CircuitArtifacts) -> Result<ZkProof, ProverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if artifacts.circuit != witness.circuit {
            return Err(ProverError::Circuit(format!(
                "artifacts are for {}, witness is for {}",
                artifacts.circuit, witness.circuit
            )));
        }
        check_challenge_signature(witness)?;
        if witness.circuit.is_query() {
            for name in ["issuerID", "issuerClaim", "issuerClaimNonRevMtp", "claimPathValue"] {
                if witness.inputs.get(name).is_none() {
                    return Err(ProverError::Witness(format!("missing input {name}")));
                }
            }
        }

        let mut pub_signals = vec![
            input(witness, "genesisID")?.to_string(),
            input(witness, "challenge")?.to_string(),
            input(witness, "gistRoot")?.to_string(),
        ];
        if witness.circuit.is_query() {
            for name in ["operator", "claimPathKey", "valueArraySize"] {
                pub_signals.push(input(witness, name)?.to_string());
            }
        }

        tracing::debug!(circuit = %witness.circuit, "mock proof generated");
        Ok(ZkProof {
            proof: ProofTriple {
                pi_a: vec![random_field(), random_field(), "1".to_string()],
                pi_b: vec![
                    vec![random_field(), random_field()],
                    vec![random_field(), random_field()],
                    vec!["1".to_string(), "0".to_string()],
                ],
                pi_c: vec![random_field(), random_field(), "1".to_string()],
                protocol: "groth16".to_string(),
                curve: "bn128".to_string(),
            },
            pub_signals,
        })
    }
}
