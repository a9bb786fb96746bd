//! # Error Taxonomy
//!
//! Structured error types shared by every zkid crate, built with `thiserror`.
//! Crate-local errors convert into these so that callers can classify a
//! failure without knowing which layer produced it:
//!
//! - [`ValidationError`]: malformed input. Never retried.
//! - [`CryptoError`]: signing, verification, key or digest failure. Never retried.
//! - [`ProofError`]: the authentication protocol could not produce a usable proof.
//! - [`TransportError`]: a network exchange failed.
//! - [`ZkidError::AuthExpired`]: the bearer token could not be refreshed.

use thiserror::Error;

/// Top-level error type for zkid.
#[derive(Error, Debug)]
pub enum ZkidError {
    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cryptographic operation failure.
    #[error("cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Proof generation or submission failure.
    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    /// Network exchange failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session token expired and the refresh attempt failed.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Input validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// DID does not conform to `did:<method>:<identifier>`.
    #[error("invalid DID format: \"{0}\" (expected did:<method>:<identifier>)")]
    InvalidDid(String),

    /// Identity identifier has the wrong length, encoding or checksum.
    #[error("invalid identity id: {0}")]
    InvalidIdentityId(String),

    /// A 32-byte hash could not be decoded.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Timestamp string is not valid UTC ISO 8601.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A named field carries an unacceptable value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name or path.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A query operator received the wrong number of values.
    #[error("query arity error: operator {operator} expects {expected} value(s), got {actual}")]
    QueryArity {
        /// Operator symbol, e.g. `$between`.
        operator: String,
        /// Human-readable expected arity.
        expected: String,
        /// Number of values supplied.
        actual: usize,
    },

    /// No proof policy is registered for the credential type.
    #[error("unknown credential type: {0}")]
    UnknownCredentialType(String),
}

/// Error in cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Digest computation failed.
    #[error("digest error: {0}")]
    DigestError(String),
}

/// Failures of the authentication proof flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// No live challenge, or the challenge is malformed.
    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),

    /// The holder has no usable (present, unrevoked) auth claim.
    #[error("no auth claim: {0}")]
    NoAuthClaim(String),

    /// The prover failed for a reason other than the above.
    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// The challenge was cleared or replaced while the proof was in flight.
    #[error("stale challenge: {0}")]
    StaleChallenge(String),
}

/// Network-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or no response was received.
    #[error("request to {endpoint} failed: {reason}")]
    Request {
        /// Endpoint path or URL.
        endpoint: String,
        /// Underlying failure description.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// Endpoint path or URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode {
        /// Endpoint path or URL.
        endpoint: String,
        /// Decoder error description.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_wraps_into_top_level() {
        let err: ZkidError = ValidationError::InvalidDid("bad:did".to_string()).into();
        let msg = format!("{err}");
        assert!(msg.contains("validation error"));
        assert!(msg.contains("bad:did"));
    }

    #[test]
    fn query_arity_display_names_operator() {
        let err = ValidationError::QueryArity {
            operator: "$between".to_string(),
            expected: "exactly 2".to_string(),
            actual: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("query arity error"));
        assert!(msg.contains("$between"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn proof_error_variants_display() {
        assert!(format!("{}", ProofError::InvalidChallenge("none".into())).contains("invalid challenge"));
        assert!(format!("{}", ProofError::NoAuthClaim("revoked".into())).contains("no auth claim"));
        assert!(format!("{}", ProofError::StaleChallenge("cancelled".into())).contains("stale"));
    }

    #[test]
    fn auth_expired_display() {
        let err = ZkidError::AuthExpired("refresh rejected".into());
        assert_eq!(format!("{err}"), "authentication expired: refresh rejected");
    }

    #[test]
    fn transport_status_display() {
        let err = TransportError::Status {
            endpoint: "/v1/credentials".into(),
            status: 503,
            body: "unavailable".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("503"));
        assert!(msg.contains("/v1/credentials"));
    }

    #[test]
    fn canonicalization_error_float_rejected() {
        let msg = format!("{}", CanonicalizationError::FloatRejected(3.5));
        assert!(msg.contains("float values are not permitted"));
    }
}
