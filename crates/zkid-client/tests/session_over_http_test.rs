//! A full authentication session against a wiremock verifier.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zkid_auth::{AuthSession, SessionConfig, SessionError, SessionState};
use zkid_client::{ClientConfig, ZkidClient};
use zkid_core::TransportError;
use zkid_crypto::Ed25519KeyPair;
use zkid_identity::IdentityRegistry;
use zkid_zkp::{ArtifactSet, CircuitId, MockProver};

async fn verifier(callback_status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "req-9",
            "from": "did:web:verifier.example",
            "body": {
                "callbackUrl": format!("{}/callback", server.uri()),
                "message": "log in",
                "scope": [{"id": 4, "circuitId": "authV2", "params": {"challenge": 482913}}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_partial_json(json!({"id": "req-9", "thid": "req-9", "to": "did:web:verifier.example"})))
        .respond_with(ResponseTemplate::new(callback_status).set_body_json(json!({"verified": true})))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn session(server: &MockServer, registry: IdentityRegistry) -> AuthSession<zkid_client::HttpTransport, MockProver> {
    let client = ZkidClient::new(ClientConfig::local(&server.uri(), "token", "refresh").unwrap()).unwrap();
    AuthSession::new(
        client.transport().clone(),
        MockProver::new(),
        registry,
        ArtifactSet::new().with(MockProver::artifacts(CircuitId::AuthV2)),
        SessionConfig::default(),
    )
}

fn holder() -> (Ed25519KeyPair, IdentityRegistry) {
    let key = Ed25519KeyPair::from_seed(&[40u8; 32]);
    let registry = IdentityRegistry::default();
    let identity = registry.create(&key.public_key()).unwrap();
    registry.publish_state(identity.did()).unwrap();
    (key, registry)
}

#[tokio::test]
async fn session_verifies_over_http() {
    let server = verifier(200).await;
    let (key, registry) = holder();
    let session = session(&server, registry);

    session
        .request_challenge(&format!("{}/auth/request", server.uri()))
        .await
        .unwrap();
    let proof = session.generate_proof(&key).await.unwrap();
    assert_eq!(proof.proof.pub_signals[1], "482913");
    let confirmation = session.submit(&proof).await.unwrap();
    assert_eq!(confirmation["verified"], true);
    assert_eq!(session.state(), SessionState::Verified);
}

#[tokio::test]
async fn rejected_proof_fails_session_without_retry() {
    let server = verifier(400).await;
    let (key, registry) = holder();
    let session = session(&server, registry);

    session
        .request_challenge(&format!("{}/auth/request", server.uri()))
        .await
        .unwrap();
    let proof = session.generate_proof(&key).await.unwrap();
    let err = session.submit(&proof).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(TransportError::Status { status: 400, .. })));
    assert_eq!(session.state(), SessionState::Failed);
}
