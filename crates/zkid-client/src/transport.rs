//! [`VerifierTransport`] over HTTP.
//!
//! Verifier endpoints are third-party URLs taken from the request itself, so
//! the transport never attaches the issuer's bearer token and never
//! refreshes it. A 401 from a verifier is an ordinary status error.

use std::future::Future;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;
use zkid_auth::{AuthorizationRequest, AuthorizationResponse, VerifierTransport};
use zkid_core::{TransportError, ZkidError};

use crate::error::ClientError;
use crate::http::check_status;

/// Fetches authorization requests and posts responses, unauthenticated.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Transport over `http`.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = format!("{method} {}", url.path());
        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| ClientError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        let resp = check_status(&endpoint, resp).await?;
        resp.json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }
}

fn parse(url: &str) -> Result<Url, ZkidError> {
    Url::parse(url).map_err(|e| {
        ZkidError::Transport(TransportError::Request {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })
    })
}

impl VerifierTransport for HttpTransport {
    fn fetch_request(&self, url: &str) -> impl Future<Output = Result<AuthorizationRequest, ZkidError>> + Send {
        let url = parse(url);
        async move {
            let request: AuthorizationRequest = self
                .send_json(Method::GET, url?, None::<&()>)
                .await
                .map_err(ZkidError::from)?;
            tracing::debug!(request_id = %request.id, verifier = %request.from, "authorization request fetched");
            Ok(request)
        }
    }

    fn submit_response(
        &self,
        callback_url: &str,
        response: &AuthorizationResponse,
    ) -> impl Future<Output = Result<Value, ZkidError>> + Send {
        let url = parse(callback_url);
        async move {
            let url = url?;
            let confirmation: Result<Value, ClientError> =
                self.send_json(Method::POST, url.clone(), Some(response)).await;
            match confirmation {
                Ok(body) => {
                    tracing::info!(thid = %response.thid, callback = %url, "authorization response accepted");
                    Ok(body)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}
