//! Contract tests for IssuerApiClient.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST | `/v1/credentials` | `create_*` |
//! | GET | `/v1/credentials/{id}` | `get_*` |
//! | PATCH | `/v1/credentials/{id}/status` | `update_status_*` |
//! | GET | `/v1/credentials?holder=` | `by_holder_*` |

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zkid_client::{ClientConfig, ClientError, CredentialRecord, ZkidClient};
use zkid_core::Did;
use zkid_crypto::Ed25519KeyPair;
use zkid_identity::IdentityRegistry;
use zkid_vc::{CredentialIssuer, CredentialRequest, CredentialStatus, ProofKind, ProofPolicy};

fn test_client(server: &MockServer) -> ZkidClient {
    ZkidClient::new(ClientConfig::local(&server.uri(), "token", "refresh").unwrap()).unwrap()
}

struct Issued {
    request: CredentialRequest,
    record: CredentialRecord,
}

fn issued() -> Issued {
    let registry = IdentityRegistry::default();
    let key = Ed25519KeyPair::from_seed(&[30u8; 32]);
    let identity = registry.create(&key.public_key()).unwrap();
    let holder = registry
        .create(&Ed25519KeyPair::from_seed(&[31u8; 32]).public_key())
        .unwrap()
        .did()
        .clone();
    let issuer = CredentialIssuer::new(
        identity,
        key,
        ProofPolicy::new().with("KYCAgeCredential", ProofKind::Signature),
    )
    .unwrap();
    let request = CredentialRequest {
        issuer: issuer.did().clone(),
        holder,
        schema_url: "https://schemas.example.com/kyc.json".to_string(),
        schema_type: "KYCAgeCredential".to_string(),
        context_url: "https://schemas.example.com/kyc.jsonld".to_string(),
        expiration: None,
        payload: json!({"birthday": 19960424}),
    };
    let credential = issuer.issue(issuer.draft(request.clone()).unwrap(), false).unwrap();
    Issued {
        request,
        record: CredentialRecord {
            id: "cred-1".to_string(),
            status: CredentialStatus::Active,
            credential,
        },
    }
}

// ── POST /v1/credentials ─────────────────────────────────────────────

#[tokio::test]
async fn create_posts_request_and_decodes_record() {
    let server = MockServer::start().await;
    let issued = issued();
    Mock::given(method("POST"))
        .and(path("/v1/credentials"))
        .and(header("authorization", "Bearer token"))
        .and(body_partial_json(json!({
            "schemaType": "KYCAgeCredential",
            "merklized": true,
            "payload": {"birthday": 19960424}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&issued.record))
        .expect(1)
        .mount(&server)
        .await;

    let record = test_client(&server).issuer().create(&issued.request, true).await.unwrap();
    assert_eq!(record, issued.record);
    zkid_vc::verify_signature(&record.credential).unwrap();
}

#[tokio::test]
async fn create_validation_failure_surfaces_status() {
    let server = MockServer::start().await;
    let issued = issued();
    Mock::given(method("POST"))
        .and(path("/v1/credentials"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown credential type"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .issuer()
        .create(&issued.request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 422, .. }));
}

// ── GET /v1/credentials/{id} ─────────────────────────────────────────

#[tokio::test]
async fn get_returns_record() {
    let server = MockServer::start().await;
    let issued = issued();
    Mock::given(method("GET"))
        .and(path("/v1/credentials/cred-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&issued.record))
        .mount(&server)
        .await;

    let record = test_client(&server).issuer().get("cred-1").await.unwrap();
    assert_eq!(record.id, "cred-1");
    assert_eq!(record.credential.holder(), &issued.request.holder);
}

#[tokio::test]
async fn get_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/credentials/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such credential"))
        .mount(&server)
        .await;

    let err = test_client(&server).issuer().get("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
}

// ── PATCH /v1/credentials/{id}/status ────────────────────────────────

#[tokio::test]
async fn update_status_revokes() {
    let server = MockServer::start().await;
    let mut revoked = issued().record;
    revoked.status = CredentialStatus::Revoked;
    Mock::given(method("PATCH"))
        .and(path("/v1/credentials/cred-1/status"))
        .and(body_partial_json(json!({"status": "revoked"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(&revoked))
        .expect(1)
        .mount(&server)
        .await;

    let record = test_client(&server)
        .issuer()
        .update_status("cred-1", CredentialStatus::Revoked)
        .await
        .unwrap();
    assert_eq!(record.status, CredentialStatus::Revoked);
}

// ── GET /v1/credentials?holder= ──────────────────────────────────────

#[tokio::test]
async fn by_holder_lists_credentials() {
    let server = MockServer::start().await;
    let issued = issued();
    let holder: &Did = &issued.request.holder;
    Mock::given(method("GET"))
        .and(path("/v1/credentials"))
        .and(query_param("holder", holder.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credentials": [&issued.record]})))
        .mount(&server)
        .await;

    let list = test_client(&server).issuer().by_holder(holder).await.unwrap();
    assert_eq!(list, vec![issued.record.clone()]);
}

#[tokio::test]
async fn by_holder_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let holder = Did::new("did:web:holder.example").unwrap();
    assert!(test_client(&server).issuer().by_holder(&holder).await.unwrap().is_empty());
}
