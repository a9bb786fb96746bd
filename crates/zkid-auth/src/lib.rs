//! # zkid-auth: Challenge-Response Authentication
//!
//! A holder answers a verifier's challenge with a zero-knowledge proof of
//! control over an identity whose auth claim is present and unrevoked.
//!
//! ## Session Lifecycle
//!
//! ```text
//! IDLE → CHALLENGE_ISSUED → PROOF_GENERATED → SUBMITTED → VERIFIED
//!              │                   │              │
//!              ├──→ CANCELLED ←────┤              │
//!              ├──→ EXPIRED   ←────┘              │
//!              └──→ FAILED    ←───────────────────┘
//! ```
//!
//! A failed proof generation is terminal: the caller requests a new
//! challenge in a new session.
//!
//! - [`session`]: [`AuthSession`], the pure session object.
//! - [`message`]: authorization request and response wire types.
//! - [`transport`]: the [`VerifierTransport`] seam.
//! - [`tracker`]: per-operation loading flag and last error.
//! - [`observer`]: [`SessionEvent`] and observer adapters.

pub mod config;
pub mod error;
pub mod message;
pub mod observer;
pub mod session;
pub mod state;
pub mod tracker;
pub mod transport;

pub use config::SessionConfig;
pub use error::SessionError;
pub use message::{
    AuthRequest, AuthorizationRequest, AuthorizationRequestBody, AuthorizationResponse, AuthorizationResponseBody,
    Challenge, ScopeParams, ScopeRequest, ScopeResponse, AUTH_REQUEST_TYPE, AUTH_RESPONSE_TYPE, MEDIA_TYPE_PLAIN,
};
pub use observer::{ChannelObserver, SessionEvent, SessionObserver, TracingObserver};
pub use session::{AuthSession, GeneratedProof};
pub use state::{SessionState, SessionTransition};
pub use tracker::{OperationKind, OperationStatus, OperationTracker};
pub use transport::VerifierTransport;
