//! # zkid-client: HTTP Transport
//!
//! - [`HttpTransport`]: the verifier side of an authentication session.
//!   Unauthenticated: verifier URLs come from the request and never see
//!   the issuer token.
//! - [`IssuerApiClient`]: create, read, update status and list credentials
//!   through an [`HttpClient`] holding the bearer credentials. A 401 from
//!   the issuer API triggers a single refresh shared by all concurrent
//!   callers; see [`http`].
//!
//! Both reuse one connection pool.

pub mod config;
pub mod error;
pub mod http;
pub mod issuer;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use http::{BearerAuth, HttpClient};
pub use issuer::{CredentialRecord, IssueCredentialRequest, IssuerApiClient};
pub use transport::HttpTransport;

use std::sync::Arc;
use std::time::Duration;

/// Top-level client holding the transport and the issuer API client.
#[derive(Debug, Clone)]
pub struct ZkidClient {
    transport: HttpTransport,
    issuer: IssuerApiClient,
    http: HttpClient,
}

impl ZkidClient {
    /// Build a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        let auth = Arc::new(BearerAuth::new(
            config.refresh_url,
            config.access_token,
            config.refresh_token,
        ));
        let transport = HttpTransport::new(http.clone());
        let http = HttpClient::new(http, auth);
        Ok(Self {
            transport,
            issuer: IssuerApiClient::new(http.clone(), config.issuer_url),
            http,
        })
    }

    /// Build a client from `ZKID_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Verifier transport.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Credential-management client.
    pub fn issuer(&self) -> &IssuerApiClient {
        &self.issuer
    }

    /// Bearer credentials of the issuer API.
    pub fn auth(&self) -> &Arc<BearerAuth> {
        self.http.auth()
    }
}
