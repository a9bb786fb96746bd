//! # Authorization Messages
//!
//! Wire shapes exchanged with a verifier and the validated
//! [`AuthRequest`] a session works from.
//!
//! Inbound:
//!
//! ```json
//! {"id": "…", "thid": "…", "typ": "…", "type": "…", "from": "did:…",
//!  "body": {"callbackUrl": "https://…", "message": "…",
//!           "scope": [{"id": 1, "circuitId": "authV2",
//!                      "params": {"challenge": 482913}, "query": {…}}]},
//!  "expires_time": 1767225600}
//! ```
//!
//! Outbound:
//!
//! ```json
//! {"id": "…", "typ": "…", "type": "…", "thid": "…", "from": "did:…", "to": "did:…",
//!  "body": {"message": "…",
//!           "scope": [{"id": 1, "circuitId": "authV2",
//!                      "proof": {"pi_a": […], "pi_b": […], "pi_c": […],
//!                                "protocol": "groth16", "curve": "bn128"},
//!                      "pub_signals": […]}]}}
//! ```
//!
//! The challenge is kept as the raw JSON the verifier sent and is signed as
//! the integer it denotes. It is never re-hashed, re-encoded or rounded.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use zkid_core::{Did, ProofError, Timestamp, ValidationError};
use zkid_zkp::{CircuitId, ProofTriple};

/// Media type of plain JSON messages.
pub const MEDIA_TYPE_PLAIN: &str = "application/zkid-plain-json";

/// Message type of authorization requests.
pub const AUTH_REQUEST_TYPE: &str = "https://zkid.dev/authorization/1.0/request";

/// Message type of authorization responses.
pub const AUTH_RESPONSE_TYPE: &str = "https://zkid.dev/authorization/1.0/response";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Inbound authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Request id.
    pub id: String,
    /// Thread id; defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// Media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Message type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Verifier DID.
    pub from: String,
    /// Body.
    pub body: AuthorizationRequestBody,
    /// Expiry, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_time: Option<i64>,
}

/// Body of an authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestBody {
    /// Where the response is posted.
    pub callback_url: String,
    /// Message shown to the holder and echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Requested proofs.
    pub scope: Vec<ScopeRequest>,
}

/// One requested proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRequest {
    /// Scope id, echoed in the response.
    pub id: u64,
    /// Circuit to prove with.
    pub circuit_id: String,
    /// Circuit parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ScopeParams>,
    /// Credential query for query circuits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
}

/// Circuit parameters of a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeParams {
    /// The challenge, exactly as sent.
    #[serde(default)]
    pub challenge: Value,
}

/// Outbound authorization response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    /// Response id.
    pub id: String,
    /// Media type.
    pub typ: String,
    /// Message type.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Thread id of the request.
    pub thid: String,
    /// Holder DID.
    pub from: String,
    /// Verifier DID.
    pub to: String,
    /// Body.
    pub body: AuthorizationResponseBody,
}

/// Body of an authorization response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponseBody {
    /// The request's message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Proofs, one per answered scope.
    pub scope: Vec<ScopeResponse>,
}

/// One proof in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeResponse {
    /// Scope id from the request.
    pub id: u64,
    /// Circuit proven.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,
    /// Proof triple.
    pub proof: ProofTriple,
    /// Public signals.
    pub pub_signals: Vec<String>,
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// A verifier challenge: the raw JSON and the integer it denotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    raw: Value,
    value: u64,
}

impl Challenge {
    /// Parse a challenge. Accepts a non-negative JSON integer or a string of
    /// decimal digits. Zero, fractions, signs and anything else are invalid.
    pub fn parse(raw: &Value) -> Result<Self, ProofError> {
        let invalid = |reason: &str| ProofError::InvalidChallenge(format!("{raw}: {reason}"));
        let value = match raw {
            Value::Number(n) => n.as_u64().ok_or_else(|| invalid("not a non-negative integer"))?,
            Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().map_err(|_| invalid("out of range"))?
            }
            Value::Null => return Err(invalid("missing")),
            _ => return Err(invalid("not an integer")),
        };
        if value == 0 {
            return Err(invalid("zero"));
        }
        Ok(Self { raw: raw.clone(), value })
    }

    /// The value as sent.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The integer that is signed.
    pub fn value(&self) -> u64 {
        self.value
    }
}

// ---------------------------------------------------------------------------
// Validated request
// ---------------------------------------------------------------------------

/// A validated authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Verifier DID.
    pub verifier: Did,
    /// Request id.
    pub request_id: String,
    /// Thread id.
    pub thread_id: String,
    /// Circuit.
    pub circuit_id: CircuitId,
    /// Scope id.
    pub scope_id: u64,
    /// Challenge.
    pub challenge: Challenge,
    /// Response endpoint.
    pub callback_url: Url,
    /// Message for the holder.
    pub message: Option<String>,
    /// Credential query, for query circuits.
    pub query: Option<Value>,
    /// Deadline for the response.
    pub expires_at: Option<Timestamp>,
}

impl AuthRequest {
    /// Validate an inbound message. Only the first scope is answered.
    pub fn from_message(msg: &AuthorizationRequest) -> Result<Self, crate::error::SessionError> {
        let verifier = Did::new(msg.from.clone())?;
        let scope = msg.body.scope.first().ok_or_else(|| ValidationError::InvalidField {
            field: "body.scope".to_string(),
            reason: "no scope requested".to_string(),
        })?;
        let circuit_id: CircuitId = scope.circuit_id.parse()?;
        let raw = scope.params.as_ref().map(|p| &p.challenge).unwrap_or(&Value::Null);
        let challenge = Challenge::parse(raw)?;
        let callback_url = Url::parse(&msg.body.callback_url).map_err(|e| ValidationError::InvalidField {
            field: "body.callbackUrl".to_string(),
            reason: e.to_string(),
        })?;
        let expires_at = msg.expires_time.map(Timestamp::from_epoch_secs).transpose()?;

        Ok(Self {
            verifier,
            request_id: msg.id.clone(),
            thread_id: msg.thid.clone().unwrap_or_else(|| msg.id.clone()),
            circuit_id,
            scope_id: scope.id,
            challenge,
            callback_url,
            message: msg.body.message.clone(),
            query: scope.query.clone(),
            expires_at,
        })
    }

    /// Whether the request has expired at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Build the response for a proof of this request. The response carries
    /// the request's id, and its thread id as `thid`.
    pub fn response(&self, holder: &Did, proof: ProofTriple, pub_signals: Vec<String>) -> AuthorizationResponse {
        AuthorizationResponse {
            id: self.request_id.clone(),
            typ: MEDIA_TYPE_PLAIN.to_string(),
            message_type: AUTH_RESPONSE_TYPE.to_string(),
            thid: self.thread_id.clone(),
            from: holder.to_string(),
            to: self.verifier.to_string(),
            body: AuthorizationResponseBody {
                message: self.message.clone(),
                scope: vec![ScopeResponse {
                    id: self.scope_id,
                    circuit_id: self.circuit_id.to_string(),
                    proof,
                    pub_signals,
                }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json(challenge: Value) -> Value {
        json!({
            "id": "7f38a193-0918-4a48-9fac-36adfdb8b542",
            "typ": MEDIA_TYPE_PLAIN,
            "type": AUTH_REQUEST_TYPE,
            "from": "did:web:verifier.example.com",
            "body": {
                "callbackUrl": "https://verifier.example.com/callback?sessionId=1",
                "message": "sign in",
                "scope": [{"id": 1, "circuitId": "authV2", "params": {"challenge": challenge}}]
            },
            "expires_time": 4102444800i64
        })
    }

    fn parse(challenge: Value) -> Result<AuthRequest, crate::error::SessionError> {
        let msg: AuthorizationRequest = serde_json::from_value(request_json(challenge)).unwrap();
        AuthRequest::from_message(&msg)
    }

    #[test]
    fn parses_request_and_defaults_thread() {
        let req = parse(json!(482913)).unwrap();
        assert_eq!(req.challenge.value(), 482913);
        assert_eq!(req.challenge.raw(), &json!(482913));
        assert_eq!(req.thread_id, req.request_id);
        assert_eq!(req.circuit_id, CircuitId::AuthV2);
        assert_eq!(req.verifier.method(), "web");
        assert!(!req.is_expired(Timestamp::now()));
    }

    #[test]
    fn challenge_forms() {
        assert_eq!(Challenge::parse(&json!("482913")).unwrap().value(), 482913);
        for bad in [json!(0), json!(-5), json!(1.5), json!("12a"), json!(""), Value::Null, json!([1])] {
            assert!(
                matches!(Challenge::parse(&bad), Err(ProofError::InvalidChallenge(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn malformed_challenge_is_invalid_challenge() {
        let err = parse(json!("abc")).unwrap_err();
        assert!(matches!(err.as_proof_error(), Some(ProofError::InvalidChallenge(_))));
    }

    #[test]
    fn response_shape() {
        let req = parse(json!(482913)).unwrap();
        let holder = Did::new("did:zkid:main:abc").unwrap();
        let triple = ProofTriple {
            pi_a: vec!["1".into()],
            pi_b: vec![vec!["2".into()]],
            pi_c: vec!["3".into()],
            protocol: "groth16".into(),
            curve: "bn128".into(),
        };
        let resp = req.response(&holder, triple, vec!["s".into()]);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["id"], json!(req.request_id));
        assert_eq!(v["type"], AUTH_RESPONSE_TYPE);
        assert_eq!(v["thid"], json!(req.thread_id));
        assert_eq!(v["to"], "did:web:verifier.example.com");
        assert_eq!(v["body"]["scope"][0]["circuitId"], "authV2");
        assert_eq!(v["body"]["scope"][0]["pub_signals"][0], "s");
        assert_eq!(v["body"]["message"], "sign in");
    }
}
