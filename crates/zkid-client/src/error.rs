//! Client error types.

use zkid_core::{TransportError, ZkidError};

/// Errors from HTTP calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or no response arrived.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// Endpoint.
        endpoint: String,
        /// Cause.
        source: reqwest::Error,
    },
    /// The server returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// Endpoint.
        endpoint: String,
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The response body did not decode.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// Endpoint.
        endpoint: String,
        /// Cause.
        source: reqwest::Error,
    },
    /// The access token was rejected and could not be refreshed.
    #[error("authentication expired: {0}")]
    AuthExpired(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<ClientError> for ZkidError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http { endpoint, source } => ZkidError::Transport(TransportError::Request {
                endpoint,
                reason: source.to_string(),
            }),
            ClientError::Api { endpoint, status, body } => {
                ZkidError::Transport(TransportError::Status { endpoint, status, body })
            }
            ClientError::Deserialization { endpoint, source } => ZkidError::Transport(TransportError::Decode {
                endpoint,
                reason: source.to_string(),
            }),
            ClientError::AuthExpired(reason) => ZkidError::AuthExpired(reason),
            ClientError::Config(e) => ZkidError::Transport(TransportError::Request {
                endpoint: "client_init".to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
