//! Contract tests for the bearer-authenticated issuer client.
//!
//! ## Behaviour Tested
//!
//! | Scenario | Test |
//! |----------|------|
//! | bearer on every call | `sends_bearer_*` |
//! | 401 → refresh → replay | `expired_token_*` |
//! | concurrent 401s share one refresh | `concurrent_401s_*` |
//! | refresh failure → `AuthExpired` for all | `failed_refresh_*` |
//! | replay rejected again → `AuthExpired` | `replay_rejected_*` |

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zkid_client::{BearerAuth, ClientError, HttpClient};

const REFRESH_PATH: &str = "/v1/auth/refresh";
const CREDENTIALS_PATH: &str = "/v1/credentials/c-1";

fn test_client(server: &MockServer) -> HttpClient {
    let refresh = Url::parse(&format!("{}{REFRESH_PATH}", server.uri())).unwrap();
    HttpClient::new(
        reqwest::Client::new(),
        Arc::new(BearerAuth::new(refresh, "old-token".into(), "refresh-1".into())),
    )
}

fn url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{CREDENTIALS_PATH}", server.uri())).unwrap()
}

async fn get(client: &HttpClient, url: Url) -> Result<Value, ClientError> {
    client.send_json::<(), Value>(Method::GET, url, None).await
}

async fn mount_refresh(server: &MockServer, template: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sends_bearer_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = get(&test_client(&server), url(&server)).await.unwrap();
    assert_eq!(body["id"], "c-1");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new-token", "refreshToken": "refresh-2"})),
        1,
    )
    .await;

    let client = test_client(&server);
    assert_eq!(get(&client, url(&server)).await.unwrap()["id"], "c-1");
    assert_eq!(client.auth().current(), ("new-token".to_string(), 1));
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
        .expect(5)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"accessToken": "new-token"}))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let client = test_client(&server);
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            let url = url(&server);
            tokio::spawn(async move { get(&client, url).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap()["id"], "c-1");
    }
    assert_eq!(client.auth().generation(), 1);
}

#[tokio::test]
async fn failed_refresh_expires_every_waiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(401).set_delay(Duration::from_millis(200)), 1).await;

    let client = test_client(&server);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            let url = url(&server);
            tokio::spawn(async move { get(&client, url).await })
        })
        .collect();
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), Err(ClientError::AuthExpired(_))));
    }
}

#[tokio::test]
async fn replay_rejected_again_is_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDENTIALS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": "still-bad"})),
        1,
    )
    .await;

    let err = get(&test_client(&server), url(&server)).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthExpired(_)));
}
