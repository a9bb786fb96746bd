//! # Authenticated HTTP
//!
//! Every call to the issuer API carries the current bearer token. A 401
//! triggers one refresh-and-replay:
//!
//! - Each caller remembers the token generation it sent with.
//! - Refreshes are serialized by a gate. A caller that gets through the
//!   gate after the generation moved on does not refresh again. It
//!   replays with the new token, or fails with `AuthExpired` if that
//!   refresh failed.
//! - The refresh endpoint is called once per generation and never retried.
//!   After a failed refresh every 401 fails with `AuthExpired` until new
//!   tokens are installed with [`BearerAuth::set_tokens`].
//! - A replay that is rejected again fails with `AuthExpired`.
//!
//! Nothing else is retried.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

#[derive(Debug)]
struct Credentials {
    access_token: String,
    refresh_token: String,
    generation: u64,
    failure: Option<String>,
}

/// Body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Bearer credentials shared by every clone of a client.
pub struct BearerAuth {
    refresh_url: Url,
    credentials: RwLock<Credentials>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("refresh_url", &self.refresh_url)
            .field("generation", &self.credentials.read().generation)
            .finish_non_exhaustive()
    }
}

impl BearerAuth {
    /// Credentials starting at generation 0.
    pub fn new(refresh_url: Url, access_token: String, refresh_token: String) -> Self {
        Self {
            refresh_url,
            credentials: RwLock::new(Credentials {
                access_token,
                refresh_token,
                generation: 0,
                failure: None,
            }),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current token and its generation.
    pub fn current(&self) -> (String, u64) {
        let c = self.credentials.read();
        (c.access_token.clone(), c.generation)
    }

    /// Number of completed refresh attempts.
    pub fn generation(&self) -> u64 {
        self.credentials.read().generation
    }

    /// Whether the last refresh failed.
    pub fn is_expired(&self) -> bool {
        self.credentials.read().failure.is_some()
    }

    /// Install new tokens, e.g. after a fresh login.
    pub fn set_tokens(&self, access_token: String, refresh_token: String) {
        let mut c = self.credentials.write();
        c.access_token = access_token;
        c.refresh_token = refresh_token;
        c.generation += 1;
        c.failure = None;
    }

    /// Refresh the token that was sent at generation `seen`, unless another
    /// caller already did.
    async fn refresh(&self, http: &reqwest::Client, seen: u64) -> Result<(), ClientError> {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let c = self.credentials.read();
            if let Some(reason) = &c.failure {
                return Err(ClientError::AuthExpired(reason.clone()));
            }
            if c.generation != seen {
                return Ok(());
            }
            c.refresh_token.clone()
        };

        tracing::info!(generation = seen, "refreshing access token");
        let outcome = self.call_refresh(http, &refresh_token).await;

        let mut c = self.credentials.write();
        c.generation += 1;
        match outcome {
            Ok(tokens) => {
                c.access_token = tokens.access_token;
                if let Some(refresh_token) = tokens.refresh_token {
                    c.refresh_token = refresh_token;
                }
                c.failure = None;
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(generation = c.generation, "token refresh failed: {reason}");
                c.failure = Some(reason.clone());
                Err(ClientError::AuthExpired(reason))
            }
        }
    }

    async fn call_refresh(&self, http: &reqwest::Client, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let endpoint = format!("POST {}", self.refresh_url.path());
        let resp = http
            .post(self.refresh_url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let resp = check_status(&endpoint, resp).await?;
        resp.json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }
}

/// A reqwest client that authenticates every call with [`BearerAuth`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    auth: Arc<BearerAuth>,
}

impl HttpClient {
    /// Wrap `http` with `auth`.
    pub fn new(http: reqwest::Client, auth: Arc<BearerAuth>) -> Self {
        Self { http, auth }
    }

    /// The shared credentials.
    pub fn auth(&self) -> &Arc<BearerAuth> {
        &self.auth
    }

    /// Send `body` (if any) to `url` and decode the JSON response.
    pub async fn send_json<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = format!("{method} {}", url.path());
        let (token, generation) = self.auth.current();
        let resp = self.send_once(&method, &url, body, &token, &endpoint).await?;

        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(endpoint = %endpoint, generation, "access token rejected");
            self.auth.refresh(&self.http, generation).await?;
            let (token, _) = self.auth.current();
            let replay = self.send_once(&method, &url, body, &token, &endpoint).await?;
            if replay.status() == StatusCode::UNAUTHORIZED {
                return Err(ClientError::AuthExpired(format!("{endpoint} rejected the refreshed token")));
            }
            replay
        } else {
            resp
        };

        let resp = check_status(&endpoint, resp).await?;
        resp.json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }

    async fn send_once<B>(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&B>,
        token: &str,
        endpoint: &str,
    ) -> Result<reqwest::Response, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let mut req = self.http.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.map_err(|e| ClientError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }
}

pub(crate) async fn check_status(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}
