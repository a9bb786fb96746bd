//! # Authentication Session
//!
//! [`AuthSession`] drives one challenge-response exchange. The caller owns
//! it; progress reaches the outside world only through attached
//! [`SessionObserver`]s.
//!
//! ## Concurrency
//!
//! - One `generate_proof` runs at a time. A second caller waits on the
//!   proof gate and then finds the challenge consumed (`InvalidChallenge`).
//! - Session fields live behind a separate short-held lock, so `cancel`
//!   never waits for the prover.
//! - Every cancellation or expiry bumps the challenge epoch. A proof whose
//!   epoch no longer matches is stale and is neither stored nor submitted.
//! - The prover runs on a blocking task. Dropping a `generate_proof` future
//!   leaves the session in `ChallengeIssued` and transmits nothing.
//!
//! ## Failure
//!
//! Any proof-generation failure other than a stale challenge ends the
//! session in `Failed` and clears the challenge. `submit` only sends the
//! exact proof this session generated and stored.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use zkid_claim::ClaimData;
use zkid_core::{Did, Hash, ProofError, Timestamp, ValidationError, ZkidError};
use zkid_crypto::Ed25519KeyPair;
use zkid_identity::{IdentityRegistry, IdentitySnapshot, ManagedIdentity};
use zkid_vc::{verify_credential, CredentialProof, VerifiableCredential};
use zkid_zkp::{
    ArtifactSet, AuthInputs, AuthPublicSignals, CircuitId, CircuitQuery, CredentialInputs, IssuerProofInputs,
    IssuerState, MerklizedValue, Operator, Prover, Query, QueryBuilder, ZkProof,
};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::message::{AuthRequest, AuthorizationRequest};
use crate::observer::{SessionEvent, SessionObserver};
use crate::state::{SessionState, SessionTransition};
use crate::tracker::{OperationKind, OperationStatus, OperationTracker};
use crate::transport::VerifierTransport;

/// A proof produced by [`AuthSession::generate_proof`], bound to the
/// challenge it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    epoch: u64,
    /// Proving identity.
    pub holder: Did,
    /// Circuit proven.
    pub circuit_id: CircuitId,
    /// Challenge answered.
    pub challenge: u64,
    /// Prover output.
    pub proof: ZkProof,
    /// Parsed auth public signals.
    pub signals: AuthPublicSignals,
}

fn stale(reason: impl Into<String>) -> SessionError {
    ProofError::StaleChallenge(reason.into()).into()
}

fn generation_failed(reason: impl Into<String>) -> SessionError {
    ProofError::ProofGenerationFailed(reason.into()).into()
}

fn invalid_credential(reason: impl Into<String>) -> SessionError {
    ValidationError::InvalidField {
        field: "credential".to_string(),
        reason: reason.into(),
    }
    .into()
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    request: Option<AuthRequest>,
    proof: Option<GeneratedProof>,
    epoch: u64,
    confirmation: Option<Value>,
    transitions: Vec<SessionTransition>,
    pending: Vec<SessionEvent>,
}

impl Inner {
    fn move_to(&mut self, to: SessionState, reason: impl Into<String>) -> Result<(), SessionError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(SessionError::IllegalTransition { from, to });
        }
        self.transitions.push(SessionTransition {
            from,
            to,
            at: Timestamp::now(),
            reason: reason.into(),
        });
        self.state = to;
        self.pending.push(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    fn clear_challenge(&mut self) {
        self.request = None;
        self.proof = None;
        self.epoch += 1;
    }

    /// Move to `Expired` if the stored challenge is past its expiry.
    fn expire_if_due(&mut self, now: Timestamp) -> Result<bool, SessionError> {
        let due = self.state.has_challenge() && self.request.as_ref().is_some_and(|r| r.is_expired(now));
        if due {
            self.clear_challenge();
            self.move_to(SessionState::Expired, "challenge expired")?;
        }
        Ok(due)
    }

    fn live_challenge(&mut self, now: Timestamp) -> Result<(u64, AuthRequest), SessionError> {
        if self.expire_if_due(now)? {
            return Err(ProofError::InvalidChallenge("challenge has expired".to_string()).into());
        }
        match (&self.state, &self.request) {
            (SessionState::ChallengeIssued, Some(request)) => Ok((self.epoch, request.clone())),
            (state, _) => Err(ProofError::InvalidChallenge(format!("no live challenge in state {state}")).into()),
        }
    }

    /// End the session after a failed proof for the challenge of `epoch`.
    /// No-op if that challenge is no longer the live one.
    fn fail_challenge(&mut self, epoch: u64, reason: String) -> Result<bool, SessionError> {
        if self.epoch != epoch || self.state != SessionState::ChallengeIssued {
            return Ok(false);
        }
        self.clear_challenge();
        self.move_to(SessionState::Failed, reason)?;
        Ok(true)
    }

    fn store_proof(&mut self, proof: &GeneratedProof, now: Timestamp) -> Result<(), SessionError> {
        if self.expire_if_due(now)? {
            return Err(stale("challenge expired during proving"));
        }
        if self.epoch != proof.epoch || self.state != SessionState::ChallengeIssued {
            return Err(stale(format!("challenge was cleared during proving (now {})", self.state)));
        }
        self.proof = Some(proof.clone());
        self.move_to(SessionState::ProofGenerated, "proof generated")
    }

    fn begin_submit(&mut self, proof: &GeneratedProof, now: Timestamp) -> Result<AuthRequest, SessionError> {
        if self.expire_if_due(now)? {
            return Err(stale("challenge has expired"));
        }
        if self.state == SessionState::ProofGenerated && self.proof.as_ref() != Some(proof) {
            return Err(stale("proof was not generated by this session"));
        }
        if proof.epoch != self.epoch {
            return Err(stale("proof answers a cleared or replaced challenge"));
        }
        if self.state != SessionState::ProofGenerated {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                operation: "submit",
            });
        }
        let request = self.request.clone().ok_or_else(|| stale("no stored request"))?;
        self.move_to(SessionState::Submitted, "proof submitted")?;
        Ok(request)
    }

    fn finish_submit(&mut self, result: &Result<Value, ZkidError>) -> Result<(), SessionError> {
        self.proof = None;
        match result {
            Ok(confirmation) => {
                self.confirmation = Some(confirmation.clone());
                self.move_to(SessionState::Verified, "verifier accepted the proof")
            }
            Err(e) => self.move_to(SessionState::Failed, e.to_string()),
        }
    }
}

fn issuer_state(snapshot: &IdentitySnapshot) -> IssuerState {
    IssuerState {
        state: snapshot.state,
        claims_tree_root: snapshot.roots.claims_root,
        rev_tree_root: snapshot.roots.revocation_root,
        roots_tree_root: snapshot.roots.roots_root,
    }
}

/// One authentication exchange.
pub struct AuthSession<T, P> {
    transport: T,
    prover: Arc<P>,
    registry: IdentityRegistry,
    artifacts: ArtifactSet,
    config: SessionConfig,
    inner: Mutex<Inner>,
    proof_gate: tokio::sync::Mutex<()>,
    tracker: Mutex<OperationTracker>,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl<T, P> std::fmt::Debug for AuthSession<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.inner.lock().state)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<T, P> AuthSession<T, P>
where
    T: VerifierTransport,
    P: Prover + 'static,
{
    /// A new session in `Idle`.
    pub fn new(transport: T, prover: P, registry: IdentityRegistry, artifacts: ArtifactSet, config: SessionConfig) -> Self {
        Self {
            transport,
            prover: Arc::new(prover),
            registry,
            artifacts,
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                request: None,
                proof: None,
                epoch: 0,
                confirmation: None,
                transitions: Vec::new(),
                pending: Vec::new(),
            }),
            proof_gate: tokio::sync::Mutex::new(()),
            tracker: Mutex::new(OperationTracker::new()),
            observers: Vec::new(),
        }
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    // -- accessors ----------------------------------------------------------

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// The stored request, while a challenge is live.
    pub fn request(&self) -> Option<AuthRequest> {
        self.inner.lock().request.clone()
    }

    /// The verifier's confirmation once `Verified`.
    pub fn confirmation(&self) -> Option<Value> {
        self.inner.lock().confirmation.clone()
    }

    /// Transition history.
    pub fn transitions(&self) -> Vec<SessionTransition> {
        self.inner.lock().transitions.clone()
    }

    /// Loading flag and last error of `kind`.
    pub fn operation(&self, kind: OperationKind) -> OperationStatus {
        self.tracker.lock().status(kind).clone()
    }

    /// Move to `Expired` if the live challenge has expired.
    pub fn check_expiry(&self) -> SessionState {
        self.with_inner(|inner| {
            if let Err(e) = inner.expire_if_due(Timestamp::now()) {
                tracing::error!("expiry check: {e}");
            }
            inner.state
        })
    }

    // -- operations ---------------------------------------------------------

    /// Fetch the authorization request at `url` and store its challenge.
    pub async fn request_challenge(&self, url: &str) -> Result<AuthRequest, SessionError> {
        self.start(OperationKind::RequestChallenge);
        let out = async {
            let state = self.state();
            if state != SessionState::Idle {
                return Err(SessionError::InvalidTransition {
                    state,
                    operation: "request a challenge",
                });
            }
            let msg = self.transport.fetch_request(url).await?;
            self.store_challenge(&msg)
        }
        .await;
        self.finish(OperationKind::RequestChallenge, out)
    }

    /// Store the challenge of an already received request.
    pub fn accept_challenge(&self, msg: &AuthorizationRequest) -> Result<AuthRequest, SessionError> {
        self.start(OperationKind::RequestChallenge);
        let out = self.store_challenge(msg);
        self.finish(OperationKind::RequestChallenge, out)
    }

    /// Prove control of the identity behind `key` for the live `authV2`
    /// challenge.
    pub async fn generate_proof(&self, key: &Ed25519KeyPair) -> Result<GeneratedProof, SessionError> {
        self.start(OperationKind::GenerateProof);
        let out = self.prove(key, None).await;
        self.finish(OperationKind::GenerateProof, out)
    }

    /// Answer the live query challenge with `credential`, issued to the
    /// identity behind `key`.
    pub async fn generate_query_proof(
        &self,
        key: &Ed25519KeyPair,
        credential: &VerifiableCredential,
    ) -> Result<GeneratedProof, SessionError> {
        self.start(OperationKind::GenerateProof);
        let out = self.prove(key, Some(credential)).await;
        self.finish(OperationKind::GenerateProof, out)
    }

    /// Send `proof` to the verifier. Not retried.
    pub async fn submit(&self, proof: &GeneratedProof) -> Result<Value, SessionError> {
        self.start(OperationKind::Submit);
        let out = self.send(proof).await;
        self.finish(OperationKind::Submit, out)
    }

    /// Abandon the live challenge. No network call is made.
    pub fn cancel(&self) -> Result<(), SessionError> {
        self.start(OperationKind::Cancel);
        let out = self.with_inner(|inner| {
            if !inner.state.has_challenge() {
                return Err(SessionError::InvalidTransition {
                    state: inner.state,
                    operation: "cancel",
                });
            }
            inner.clear_challenge();
            inner.move_to(SessionState::Cancelled, "cancelled by holder")
        });
        self.finish(OperationKind::Cancel, out)
    }

    // -- internals ----------------------------------------------------------

    /// Run `f` under the session lock, then emit the state changes it made.
    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (out, events) = {
            let mut inner = self.inner.lock();
            let out = f(&mut inner);
            (out, std::mem::take(&mut inner.pending))
        };
        for event in &events {
            self.emit(event);
        }
        out
    }

    fn emit(&self, event: &SessionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn start(&self, kind: OperationKind) {
        self.tracker.lock().begin(kind);
        self.emit(&SessionEvent::Started { operation: kind });
    }

    fn finish<R>(&self, kind: OperationKind, out: Result<R, SessionError>) -> Result<R, SessionError> {
        match &out {
            Ok(_) => {
                self.tracker.lock().succeed(kind);
                self.emit(&SessionEvent::Succeeded { operation: kind });
            }
            Err(e) => {
                let error = e.to_string();
                self.tracker.lock().fail(kind, error.clone());
                self.emit(&SessionEvent::Failed { operation: kind, error });
            }
        }
        out
    }

    fn store_challenge(&self, msg: &AuthorizationRequest) -> Result<AuthRequest, SessionError> {
        let mut request = AuthRequest::from_message(msg)?;
        let now = Timestamp::now();
        if request.expires_at.is_none() {
            request.expires_at = self.config.default_challenge_ttl_secs.map(|ttl| now.plus_secs(ttl));
        }
        if request.is_expired(now) {
            return Err(ProofError::InvalidChallenge(format!("request {} has expired", request.request_id)).into());
        }

        self.with_inner(|inner| {
            if inner.state != SessionState::Idle {
                return Err(SessionError::InvalidTransition {
                    state: inner.state,
                    operation: "accept a challenge",
                });
            }
            inner.request = Some(request.clone());
            inner.epoch += 1;
            inner.move_to(SessionState::ChallengeIssued, format!("challenge from {}", request.verifier))
        })?;
        tracing::info!(
            verifier = %request.verifier,
            request_id = %request.request_id,
            circuit = %request.circuit_id,
            "challenge accepted"
        );
        Ok(request)
    }

    fn build_query(&self, request: &AuthRequest) -> Result<Option<CircuitQuery>, SessionError> {
        let builder = QueryBuilder::new(self.config.decimal_scale);
        Ok(match &request.query {
            Some(query) => Some(builder.build_request(query)?),
            None if request.circuit_id.is_query() => Some(builder.build(&Query::new("", Operator::Noop, Vec::new()))?),
            None => None,
        })
    }

    async fn prove(
        &self,
        key: &Ed25519KeyPair,
        credential: Option<&VerifiableCredential>,
    ) -> Result<GeneratedProof, SessionError> {
        let _gate = self.proof_gate.lock().await;

        let (epoch, request) = self.with_inner(|inner| inner.live_challenge(Timestamp::now()))?;
        match (request.circuit_id.is_query(), credential.is_some()) {
            (true, false) => {
                return Err(invalid_credential(format!("{} needs a credential", request.circuit_id)));
            }
            (false, true) => {
                return Err(invalid_credential(format!("{} takes no credential", request.circuit_id)));
            }
            _ => {}
        }

        let out = self.prove_live(epoch, &request, key, credential).await;
        if let Err(e) = &out {
            if !matches!(e.as_proof_error(), Some(ProofError::StaleChallenge(_))) {
                let failed = self.with_inner(|inner| inner.fail_challenge(epoch, e.to_string()))?;
                if failed {
                    tracing::warn!(request_id = %request.request_id, "proof generation failed: {e}");
                }
            }
        }
        out
    }

    async fn prove_live(
        &self,
        epoch: u64,
        request: &AuthRequest,
        key: &Ed25519KeyPair,
        credential: Option<&VerifiableCredential>,
    ) -> Result<GeneratedProof, SessionError> {
        // Query arity and values are checked before any proving work.
        let query = self.build_query(request)?;

        let public_key = key.public_key();
        let identity = self
            .registry
            .get_by_key(&public_key)
            .map_err(|e| ProofError::NoAuthClaim(format!("no identity for key {public_key}: {e}")))?;
        let auth = identity
            .auth_claim_proofs()
            .map_err(|e| ProofError::NoAuthClaim(e.to_string()))?;
        if !auth.inclusion.existence {
            return Err(ProofError::NoAuthClaim(format!("auth claim of {} is not in its claims tree", identity.did())).into());
        }
        if auth.non_revocation.existence {
            return Err(ProofError::NoAuthClaim(format!("auth claim of {} is revoked", identity.did())).into());
        }
        let gist = self
            .registry
            .gist()
            .proof(&identity.id())
            .map_err(|e| generation_failed(format!("global state proof: {e}")))?;
        if self.registry.gist().state_of(&identity.id()) != Some(auth.snapshot.state) {
            return Err(generation_failed(format!(
                "published state of {} is not its current state",
                identity.did()
            )));
        }

        let challenge = request.challenge.value();
        let inputs = AuthInputs {
            genesis_id: identity.id(),
            profile_nonce: self.config.profile_nonce,
            state: auth.snapshot.state,
            claims_tree_root: auth.snapshot.roots.claims_root,
            rev_tree_root: auth.snapshot.roots.revocation_root,
            roots_tree_root: auth.snapshot.roots.roots_root,
            auth_claim: auth.claim,
            auth_claim_inc_mtp: auth.inclusion,
            auth_claim_non_rev_mtp: auth.non_revocation,
            challenge,
            challenge_signature: key.sign(&Hash::from_u64(challenge)),
            gist_root: gist.root,
            gist_mtp: gist.proof,
        };
        let witness = match (&query, credential) {
            (Some(q), Some(vc)) => {
                let credential_inputs = self.credential_inputs(&identity, request.circuit_id, q, vc)?;
                inputs.query_witness(request.circuit_id, q, &credential_inputs)
            }
            _ => inputs.witness(),
        }
        .map_err(ProofError::from)?;
        let artifacts = self.artifacts.get(request.circuit_id).map_err(ProofError::from)?;

        tracing::debug!(did = %identity.did(), circuit = %request.circuit_id, "proving");
        let prover = Arc::clone(&self.prover);
        let output = tokio::task::spawn_blocking(move || prover.prove(&witness, &artifacts))
            .await
            .map_err(|e| generation_failed(format!("prover task: {e}")))?
            .map_err(ProofError::from)?;

        let head = output.pub_signals.get(..3).unwrap_or(&output.pub_signals);
        let signals = AuthPublicSignals::parse(head).map_err(ProofError::from)?;
        if signals.challenge != challenge || signals.user_id != identity.id() {
            return Err(generation_failed("public signals do not match the request"));
        }

        let proof = GeneratedProof {
            epoch,
            holder: identity.did().clone(),
            circuit_id: request.circuit_id,
            challenge,
            proof: output,
            signals,
        };
        self.with_inner(|inner| inner.store_proof(&proof, Timestamp::now()))?;
        tracing::info!(did = %proof.holder, circuit = %proof.circuit_id, challenge, "proof generated");
        Ok(proof)
    }

    /// Credential-side circuit inputs for `credential`, held by `holder`.
    fn credential_inputs(
        &self,
        holder: &ManagedIdentity,
        circuit: CircuitId,
        query: &CircuitQuery,
        credential: &VerifiableCredential,
    ) -> Result<CredentialInputs, SessionError> {
        if credential.holder() != holder.did() {
            return Err(invalid_credential(format!(
                "credential {} is held by {}, not {}",
                credential.id(),
                credential.holder(),
                holder.did()
            )));
        }
        verify_credential(credential, Timestamp::now()).map_err(ZkidError::from)?;

        let issuer_proof = match &credential.proof {
            CredentialProof::Signature(p) => IssuerProofInputs::Signature {
                auth_claim: p.issuer_auth_claim,
                auth_claim_mtp: p.issuer_auth_proof.proof.clone(),
                auth_state: issuer_state(&p.issuer_auth_proof.snapshot),
                signature: p.signature,
            },
            CredentialProof::MerkleProof(p) => IssuerProofInputs::Mtp {
                claim_mtp: p.claim_proof.proof.clone(),
                claim_state: issuer_state(&p.claim_proof.snapshot),
            },
        };
        if issuer_proof.circuit() != circuit {
            return Err(invalid_credential(format!(
                "credential proof is for {}, the request asks for {circuit}",
                issuer_proof.circuit()
            )));
        }

        let issuer = self
            .registry
            .get(credential.issuer())
            .map_err(|e| generation_failed(format!("issuer {}: {e}", credential.issuer())))?;
        let non_rev = issuer
            .revocation_proof(credential.revocation_nonce())
            .map_err(|e| generation_failed(format!("issuer revocation proof: {e}")))?;
        if non_rev.proof.existence {
            return Err(generation_failed(format!("credential {} is revoked", credential.id())));
        }

        let merklized = match credential.core_claim.decode().map_err(ZkidError::from)?.data {
            ClaimData::Merklized(root) => {
                let payload = credential
                    .body
                    .merklize(self.config.decimal_scale)
                    .map_err(ZkidError::from)?;
                if payload.root() != root {
                    return Err(invalid_credential("subject does not merklize to the claim root"));
                }
                let (mtp, value) = payload
                    .prove_key(&query.claim_path_key)
                    .map_err(ZkidError::from)?;
                Some(MerklizedValue {
                    root,
                    path_key: query.claim_path_key,
                    value,
                    mtp,
                })
            }
            ClaimData::Flat(_) => None,
        };

        Ok(CredentialInputs {
            issuer_id: issuer.id(),
            claim: credential.core_claim,
            non_rev_mtp: non_rev.proof,
            non_rev_state: issuer_state(&non_rev.snapshot),
            issuer_proof,
            merklized,
        })
    }

    async fn send(&self, proof: &GeneratedProof) -> Result<Value, SessionError> {
        let request = self.with_inner(|inner| inner.begin_submit(proof, Timestamp::now()))?;

        let response = request.response(&proof.holder, proof.proof.proof.clone(), proof.proof.pub_signals.clone());
        let result = self
            .transport
            .submit_response(request.callback_url.as_str(), &response)
            .await;

        self.with_inner(|inner| inner.finish_submit(&result))?;
        match result {
            Ok(confirmation) => {
                tracing::info!(verifier = %request.verifier, request_id = %request.request_id, "authentication verified");
                Ok(confirmation)
            }
            Err(e) => {
                tracing::warn!(verifier = %request.verifier, request_id = %request.request_id, "submission failed: {e}");
                Err(e.into())
            }
        }
    }
}
