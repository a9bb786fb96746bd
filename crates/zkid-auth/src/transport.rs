//! Verifier transport seam.
//!
//! The session never performs I/O itself. `zkid-client` implements this
//! trait over HTTP; tests use in-memory doubles.

use std::future::Future;

use serde_json::Value;
use zkid_core::ZkidError;

use crate::message::{AuthorizationRequest, AuthorizationResponse};

/// Exchanges authorization messages with a verifier.
///
/// Implementations report failures as [`ZkidError::Transport`], or
/// [`ZkidError::AuthExpired`] when a bearer token could not be refreshed.
/// They must not retry `submit_response`.
pub trait VerifierTransport: Send + Sync {
    /// Fetch the authorization request published at `url`.
    fn fetch_request(&self, url: &str) -> impl Future<Output = Result<AuthorizationRequest, ZkidError>> + Send;

    /// Post a response to the request's callback and return the verifier's
    /// confirmation body.
    fn submit_response(
        &self,
        callback_url: &str,
        response: &AuthorizationResponse,
    ) -> impl Future<Output = Result<Value, ZkidError>> + Send;
}
