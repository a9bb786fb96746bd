//! End-to-end session tests against an in-memory verifier and the mock
//! prover.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use zkid_auth::{
    AuthSession, AuthorizationRequest, AuthorizationResponse, OperationKind, SessionConfig, SessionError,
    SessionEvent, SessionState, VerifierTransport,
};
use zkid_core::{ProofError, Timestamp, TransportError, ValidationError, ZkidError};
use zkid_crypto::Ed25519KeyPair;
use zkid_identity::IdentityRegistry;
use zkid_vc::{CredentialIssuer, CredentialRequest, ProofKind, ProofPolicy, VerifiableCredential};
use zkid_zkp::{ArtifactSet, CircuitId, MockProver};

const CALLBACK: &str = "https://verifier.example/callback";

#[derive(Clone, Default)]
struct MemoryVerifier {
    request: Option<AuthorizationRequest>,
    reject: bool,
    submitted: Arc<Mutex<Vec<AuthorizationResponse>>>,
}

impl VerifierTransport for MemoryVerifier {
    fn fetch_request(&self, url: &str) -> impl Future<Output = Result<AuthorizationRequest, ZkidError>> + Send {
        let out = self.request.clone().ok_or_else(|| {
            ZkidError::Transport(TransportError::Status {
                endpoint: url.to_string(),
                status: 404,
                body: "no request".to_string(),
            })
        });
        async move { out }
    }

    fn submit_response(
        &self,
        callback_url: &str,
        response: &AuthorizationResponse,
    ) -> impl Future<Output = Result<Value, ZkidError>> + Send {
        self.submitted.lock().unwrap().push(response.clone());
        let out = if self.reject {
            Err(ZkidError::Transport(TransportError::Status {
                endpoint: callback_url.to_string(),
                status: 400,
                body: "proof rejected".to_string(),
            }))
        } else {
            Ok(json!({"status": "ok"}))
        };
        async move { out }
    }
}

fn request_message(challenge: Value, circuit: &str, query: Option<Value>, expires_time: Option<i64>) -> AuthorizationRequest {
    let mut scope = json!({"id": 1, "circuitId": circuit, "params": {"challenge": challenge}});
    if let Some(query) = query {
        scope["query"] = query;
    }
    let mut msg = json!({
        "id": "req-1",
        "from": "did:web:verifier.example",
        "body": {"callbackUrl": CALLBACK, "message": "sign in", "scope": [scope]},
    });
    if let Some(expires_time) = expires_time {
        msg["expires_time"] = json!(expires_time);
    }
    serde_json::from_value(msg).unwrap()
}

fn auth_request(challenge: u64) -> AuthorizationRequest {
    request_message(json!(challenge), "authV2", None, None)
}

struct Fixture {
    key: Ed25519KeyPair,
    registry: IdentityRegistry,
    prover: MockProver,
}

fn fixture() -> Fixture {
    let key = Ed25519KeyPair::from_seed(&[7u8; 32]);
    let registry = IdentityRegistry::default();
    let identity = registry.create(&key.public_key()).unwrap();
    registry.publish_state(identity.did()).unwrap();
    Fixture {
        key,
        registry,
        prover: MockProver::new(),
    }
}

fn artifacts() -> ArtifactSet {
    CircuitId::ALL
        .into_iter()
        .fold(ArtifactSet::new(), |set, c| set.with(MockProver::artifacts(c)))
}

fn session(f: &Fixture, verifier: MemoryVerifier) -> AuthSession<MemoryVerifier, MockProver> {
    AuthSession::new(
        verifier,
        f.prover.clone(),
        f.registry.clone(),
        artifacts(),
        SessionConfig::default(),
    )
}

/// Issue a credential to the fixture holder from a fresh issuer in the same
/// registry.
fn credential(f: &Fixture, kind: ProofKind, merklized: bool) -> VerifiableCredential {
    let issuer_key = Ed25519KeyPair::from_seed(&[20u8; 32]);
    let identity = match f.registry.get_by_key(&issuer_key.public_key()) {
        Ok(identity) => identity,
        Err(_) => f.registry.create(&issuer_key.public_key()).unwrap(),
    };
    let policy = ProofPolicy::new().with("KYCAgeCredential", kind);
    let issuer = CredentialIssuer::new(identity, issuer_key, policy).unwrap();
    let holder = f.registry.get_by_key(&f.key.public_key()).unwrap().did().clone();
    let draft = issuer
        .draft(CredentialRequest {
            issuer: issuer.did().clone(),
            holder,
            schema_url: "https://schemas.example.com/kyc.json".to_string(),
            schema_type: "KYCAgeCredential".to_string(),
            context_url: "https://schemas.example.com/kyc.jsonld".to_string(),
            expiration: None,
            payload: json!({"birthday": 19960424, "documentType": 2}),
        })
        .unwrap();
    issuer.issue(draft, merklized).unwrap()
}

fn proof_error(err: SessionError) -> ProofError {
    match err {
        SessionError::Proof(p) => p,
        other => panic!("expected a proof error, got {other:?}"),
    }
}

#[tokio::test]
async fn happy_path_reaches_verified() {
    let f = fixture();
    let verifier = MemoryVerifier {
        request: Some(auth_request(482913)),
        ..Default::default()
    };
    let submitted = Arc::clone(&verifier.submitted);
    let (observer, mut events) = zkid_auth::ChannelObserver::new();
    let session = session(&f, verifier).with_observer(observer);

    let request = session.request_challenge("https://verifier.example/auth").await.unwrap();
    assert_eq!(request.challenge.value(), 482913);
    assert_eq!(session.state(), SessionState::ChallengeIssued);

    let proof = session.generate_proof(&f.key).await.unwrap();
    assert_eq!(session.state(), SessionState::ProofGenerated);
    assert_eq!(proof.challenge, 482913);

    let confirmation = session.submit(&proof).await.unwrap();
    assert_eq!(confirmation["status"], "ok");
    assert_eq!(session.state(), SessionState::Verified);
    assert_eq!(session.confirmation(), Some(confirmation));

    let sent = submitted.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, "req-1");
    assert_eq!(sent[0].thid, "req-1");
    assert_eq!(sent[0].to, "did:web:verifier.example");
    assert_eq!(sent[0].body.scope[0].id, 1);
    assert_eq!(sent[0].body.message.as_deref(), Some("sign in"));

    let states: Vec<_> = session.transitions().iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            SessionState::ChallengeIssued,
            SessionState::ProofGenerated,
            SessionState::Submitted,
            SessionState::Verified
        ]
    );

    let mut changes = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::StateChanged { .. }) {
            changes += 1;
        }
    }
    assert_eq!(changes, 4);
}

#[tokio::test]
async fn challenge_is_signed_literally() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(482913)).unwrap();

    // The mock prover rejects a witness whose challenge signature does not
    // verify over the challenge integer.
    let proof = session.generate_proof(&f.key).await.unwrap();
    assert_eq!(proof.proof.pub_signals[1], "482913");
    assert_eq!(proof.signals.challenge, 482913);
    assert_eq!(proof.signals.user_id, f.registry.get_by_key(&f.key.public_key()).unwrap().id());
}

#[tokio::test]
async fn string_challenge_is_accepted() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let request = session
        .accept_challenge(&request_message(json!("1000"), "authV2", None, None))
        .unwrap();
    assert_eq!(request.challenge.value(), 1000);
    assert_eq!(request.challenge.raw(), &json!("1000"));
}

#[tokio::test]
async fn malformed_challenge_is_rejected() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    for bad in [json!(0), json!(-4), json!(1.5), json!("12a"), Value::Null] {
        let err = session
            .accept_challenge(&request_message(bad, "authV2", None, None))
            .unwrap_err();
        assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    }
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.operation(OperationKind::RequestChallenge).last_error.is_some());
}

#[tokio::test]
async fn generate_without_challenge_fails() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert_eq!(f.prover.calls(), 0);
}

#[tokio::test]
async fn cancel_clears_challenge() {
    let f = fixture();
    let verifier = MemoryVerifier::default();
    let submitted = Arc::clone(&verifier.submitted);
    let session = session(&f, verifier);
    session.accept_challenge(&auth_request(77)).unwrap();

    session.cancel().unwrap();
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.request().is_none());

    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert!(submitted.lock().unwrap().is_empty());

    assert!(matches!(
        session.cancel(),
        Err(SessionError::InvalidTransition { state: SessionState::Cancelled, .. })
    ));
}

#[tokio::test]
async fn cancelled_proof_is_not_submitted() {
    let f = fixture();
    let verifier = MemoryVerifier::default();
    let submitted = Arc::clone(&verifier.submitted);
    let session = session(&f, verifier);
    session.accept_challenge(&auth_request(77)).unwrap();
    let proof = session.generate_proof(&f.key).await.unwrap();

    session.cancel().unwrap();
    let err = session.submit(&proof).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::StaleChallenge(_)));
    assert!(submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_generate_proof_runs_once() {
    let mut f = fixture();
    f.prover = MockProver::new().with_delay(Duration::from_millis(200));
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(5)).unwrap();

    let (a, b) = tokio::join!(session.generate_proof(&f.key), session.generate_proof(&f.key));
    let (ok, err) = match (a, b) {
        (Ok(p), Err(e)) | (Err(e), Ok(p)) => (p, e),
        other => panic!("expected exactly one success, got {other:?}"),
    };
    assert_eq!(ok.challenge, 5);
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert_eq!(f.prover.calls(), 1);
    assert_eq!(session.state(), SessionState::ProofGenerated);
}

#[tokio::test]
async fn cancel_during_proving_makes_result_stale() {
    let mut f = fixture();
    f.prover = MockProver::new().with_delay(Duration::from_millis(300));
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(9)).unwrap();

    let (proved, cancelled) = tokio::join!(session.generate_proof(&f.key), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.operation(OperationKind::GenerateProof).loading());
        session.cancel()
    });
    cancelled.unwrap();
    assert!(matches!(proof_error(proved.unwrap_err()), ProofError::StaleChallenge(_)));
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(!session.operation(OperationKind::GenerateProof).loading());
}

#[tokio::test]
async fn revoked_auth_claim_is_refused() {
    let f = fixture();
    let identity = f.registry.get_by_key(&f.key.public_key()).unwrap();
    identity.revoke(identity.auth_claim().revocation_nonce()).unwrap();

    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(11)).unwrap();
    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::NoAuthClaim(_)));
    assert_eq!(f.prover.calls(), 0);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.request().is_none());
}

#[tokio::test]
async fn unknown_key_has_no_auth_claim() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(11)).unwrap();
    let stranger = Ed25519KeyPair::from_seed(&[8u8; 32]);
    let err = session.generate_proof(&stranger).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::NoAuthClaim(_)));
}

#[tokio::test]
async fn query_arity_checked_before_proving() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let query = json!({"credentialSubject": {"birthday": {"$between": [19900101]}}});
    session
        .accept_challenge(&request_message(json!(3), "credentialAtomicQuerySigV2", Some(query), None))
        .unwrap();

    let vc = credential(&f, ProofKind::Signature, false);
    let err = session.generate_query_proof(&f.key, &vc).await.unwrap_err();
    match err {
        SessionError::Query(q) => assert!(q.is_arity()),
        other => panic!("expected a query error, got {other:?}"),
    }
    assert_eq!(f.prover.calls(), 0);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session
        .operation(OperationKind::GenerateProof)
        .last_error
        .is_some_and(|e| e.contains("$between")));
}

#[tokio::test]
async fn query_circuit_exposes_query_signals() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let query = json!({"credentialSubject": {"birthday": {"$lt": 20000101}}});
    session
        .accept_challenge(&request_message(json!(3), "credentialAtomicQuerySigV2", Some(query), None))
        .unwrap();
    let vc = credential(&f, ProofKind::Signature, true);
    let proof = session.generate_query_proof(&f.key, &vc).await.unwrap();
    assert_eq!(proof.circuit_id, CircuitId::AtomicQuerySigV2);
    assert_eq!(proof.proof.pub_signals.len(), 6);
    assert_eq!(
        proof.proof.pub_signals[4],
        zkid_claim::path_key("birthday").unwrap().to_hex()
    );
}

#[tokio::test]
async fn anchored_credential_answers_mtp_query() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    session
        .accept_challenge(&request_message(json!(8), "credentialAtomicQueryMTPV2", None, None))
        .unwrap();
    let vc = credential(&f, ProofKind::MerkleTree, false);
    let proof = session.generate_query_proof(&f.key, &vc).await.unwrap();
    assert_eq!(proof.circuit_id, CircuitId::AtomicQueryMtpV2);
    assert_eq!(session.state(), SessionState::ProofGenerated);
}

#[tokio::test]
async fn query_challenge_needs_a_credential() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    session
        .accept_challenge(&request_message(json!(3), "credentialAtomicQuerySigV2", None, None))
        .unwrap();
    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(ValidationError::InvalidField { ref field, .. }) if field == "credential"));
    assert_eq!(session.state(), SessionState::ChallengeIssued);

    // A credential of the wrong proof kind is a failed attempt.
    let anchored = credential(&f, ProofKind::MerkleTree, false);
    assert!(matches!(
        session.generate_query_proof(&f.key, &anchored).await,
        Err(SessionError::Validation(_))
    ));
    assert_eq!(f.prover.calls(), 0);
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn revoked_credential_fails_the_session() {
    let f = fixture();
    let vc = credential(&f, ProofKind::Signature, false);
    let issuer = f.registry.get(vc.issuer()).unwrap();
    issuer.revoke(vc.revocation_nonce()).unwrap();

    let session = session(&f, MemoryVerifier::default());
    session
        .accept_challenge(&request_message(json!(3), "credentialAtomicQuerySigV2", None, None))
        .unwrap();
    let err = session.generate_query_proof(&f.key, &vc).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::ProofGenerationFailed(_)));
    assert_eq!(f.prover.calls(), 0);
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn prover_failure_is_proof_generation_failed() {
    let mut f = fixture();
    f.prover = MockProver::new().failing(zkid_zkp::ProverError::Prover("out of memory".to_string()));
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(12)).unwrap();
    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::ProofGenerationFailed(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.transitions().last().map(|t| t.from), Some(SessionState::ChallengeIssued));
}

#[tokio::test]
async fn failed_proof_is_not_retried_on_the_same_challenge() {
    let mut f = fixture();
    f.prover = MockProver::new().failing(zkid_zkp::ProverError::Prover("out of memory".to_string()));
    let session = session(&f, MemoryVerifier::default());
    session.accept_challenge(&auth_request(12)).unwrap();
    assert!(session.generate_proof(&f.key).await.is_err());

    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert_eq!(f.prover.calls(), 1);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(
        session.accept_challenge(&auth_request(13)),
        Err(SessionError::InvalidTransition { state: SessionState::Failed, .. })
    ));
}

#[tokio::test]
async fn proof_from_another_session_is_not_submitted() {
    let f = fixture();
    let first_verifier = MemoryVerifier::default();
    let first_sent = Arc::clone(&first_verifier.submitted);
    let first = session(&f, first_verifier);
    let second = session(&f, MemoryVerifier::default());
    first.accept_challenge(&auth_request(31)).unwrap();
    second.accept_challenge(&auth_request(32)).unwrap();
    first.generate_proof(&f.key).await.unwrap();
    let foreign = second.generate_proof(&f.key).await.unwrap();

    let err = first.submit(&foreign).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::StaleChallenge(_)));
    assert!(first_sent.lock().unwrap().is_empty());
    assert_eq!(first.state(), SessionState::ProofGenerated);
}

#[tokio::test]
async fn unpublished_state_is_refused() {
    let f = fixture();
    let identity = f.registry.get_by_key(&f.key.public_key()).unwrap();
    let extra = zkid_claim::auth_claim(&Ed25519KeyPair::from_seed(&[9u8; 32]).public_key()).unwrap();
    identity.insert_claim(&extra).unwrap();

    let stale = session(&f, MemoryVerifier::default());
    stale.accept_challenge(&auth_request(14)).unwrap();
    let err = stale.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::ProofGenerationFailed(_)));
    assert_eq!(f.prover.calls(), 0);
    assert_eq!(stale.state(), SessionState::Failed);

    f.registry.publish_state(identity.did()).unwrap();
    let fresh = session(&f, MemoryVerifier::default());
    fresh.accept_challenge(&auth_request(15)).unwrap();
    assert!(fresh.generate_proof(&f.key).await.is_ok());
}

#[tokio::test]
async fn rejected_submission_fails_session() {
    let f = fixture();
    let verifier = MemoryVerifier {
        reject: true,
        ..Default::default()
    };
    let submitted = Arc::clone(&verifier.submitted);
    let session = session(&f, verifier);
    session.accept_challenge(&auth_request(13)).unwrap();
    let proof = session.generate_proof(&f.key).await.unwrap();

    assert!(matches!(session.submit(&proof).await, Err(SessionError::Transport(_))));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(submitted.lock().unwrap().len(), 1);

    assert!(matches!(session.submit(&proof).await, Err(SessionError::InvalidTransition { .. })));
    assert_eq!(submitted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_request_is_rejected() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let past = Timestamp::now().epoch_secs() - 10;
    let err = session
        .accept_challenge(&request_message(json!(4), "authV2", None, Some(past)))
        .unwrap_err();
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn challenge_expires_before_proving() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let soon = Timestamp::now().epoch_secs() + 2;
    session
        .accept_challenge(&request_message(json!(4), "authV2", None, Some(soon)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let err = session.generate_proof(&f.key).await.unwrap_err();
    assert!(matches!(proof_error(err), ProofError::InvalidChallenge(_)));
    assert_eq!(session.state(), SessionState::Expired);
    assert_eq!(f.prover.calls(), 0);
}

#[tokio::test]
async fn last_error_cleared_by_success() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    assert!(session.accept_challenge(&auth_request(0)).is_err());
    assert!(session.operation(OperationKind::RequestChallenge).last_error.is_some());

    session.accept_challenge(&auth_request(21)).unwrap();
    let status = session.operation(OperationKind::RequestChallenge);
    assert_eq!(status.last_error, None);
    assert!(!status.loading());
}

#[tokio::test]
async fn fetch_failure_keeps_idle() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let err = session.request_challenge("https://verifier.example/auth").await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(TransportError::Status { status: 404, .. })));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn request_without_scope_is_invalid() {
    let f = fixture();
    let session = session(&f, MemoryVerifier::default());
    let mut msg = auth_request(1);
    msg.body.scope.clear();
    assert!(matches!(
        session.accept_challenge(&msg),
        Err(SessionError::Validation(ValidationError::InvalidField { .. }))
    ));
}
