//! Typed client for the credential-management API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/credentials` | Create (issue) a credential |
//! | GET    | `/v1/credentials/{id}` | Get by id |
//! | PATCH  | `/v1/credentials/{id}/status` | Update status |
//! | GET    | `/v1/credentials?holder={did}` | List by holder |

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;
use zkid_core::Did;
use zkid_vc::{CredentialRequest, CredentialStatus, VerifiableCredential};

use crate::error::ClientError;
use crate::http::HttpClient;

const API_PREFIX: &str = "v1/credentials";

/// A credential as stored by the issuer service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Service-side id.
    pub id: String,
    /// Revocation status.
    pub status: CredentialStatus,
    /// The credential.
    pub credential: VerifiableCredential,
}

/// Issuance request: the draft input plus the storage mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialRequest<'a> {
    /// Draft input.
    #[serde(flatten)]
    pub request: &'a CredentialRequest,
    /// Whether the payload is merklized into the claim.
    pub merklized: bool,
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: CredentialStatus,
}

#[derive(Debug, Deserialize)]
struct CredentialList {
    #[serde(default)]
    credentials: Vec<CredentialRecord>,
}

/// Client for `/v1/credentials`.
#[derive(Debug, Clone)]
pub struct IssuerApiClient {
    client: HttpClient,
    base_url: Url,
}

impl IssuerApiClient {
    /// Client for the service at `base_url`.
    pub fn new(client: HttpClient, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| {
            ClientError::Config(crate::config::ConfigError::InvalidUrl(joined.clone(), e.to_string()))
        })
    }

    /// Issue a credential.
    pub async fn create(&self, request: &CredentialRequest, merklized: bool) -> Result<CredentialRecord, ClientError> {
        let body = IssueCredentialRequest { request, merklized };
        let record: CredentialRecord = self
            .client
            .send_json(Method::POST, self.url(API_PREFIX)?, Some(&body))
            .await?;
        tracing::info!(id = %record.id, holder = %record.credential.holder(), "credential created");
        Ok(record)
    }

    /// Fetch one credential.
    pub async fn get(&self, id: &str) -> Result<CredentialRecord, ClientError> {
        self.client
            .send_json(Method::GET, self.url(&format!("{API_PREFIX}/{id}"))?, None::<&()>)
            .await
    }

    /// Set the status of a credential. `Revoked` revokes it.
    pub async fn update_status(&self, id: &str, status: CredentialStatus) -> Result<CredentialRecord, ClientError> {
        let record: CredentialRecord = self
            .client
            .send_json(
                Method::PATCH,
                self.url(&format!("{API_PREFIX}/{id}/status"))?,
                Some(&StatusUpdate { status }),
            )
            .await?;
        tracing::info!(id = %id, status = ?record.status, "credential status updated");
        Ok(record)
    }

    /// Credentials issued to `holder`.
    pub async fn by_holder(&self, holder: &Did) -> Result<Vec<CredentialRecord>, ClientError> {
        let mut url = self.url(API_PREFIX)?;
        url.query_pairs_mut().append_pair("holder", holder.as_str());
        let list: CredentialList = self.client.send_json(Method::GET, url, None::<&()>).await?;
        Ok(list.credentials)
    }
}
