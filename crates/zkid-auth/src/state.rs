//! # Session States
//!
//! ```text
//! Idle ──▶ ChallengeIssued ──▶ ProofGenerated ──▶ Submitted ──▶ Verified
//!             │  │  │                │                 │
//!             │  │  └──▶ Expired ◀───┤                 │
//!             │  │                   │                 │
//!             │  └─────▶ Cancelled ◀─┘                 │
//!             │                                        │
//!             └────────────────────────────────────────┴──▶ Failed
//! ```
//!
//! Verified, Failed, Cancelled and Expired are terminal. A session answers
//! one challenge; a new challenge needs a new session. Proof generation that
//! fails for any reason other than a cleared challenge ends the session in
//! Failed.

use serde::{Deserialize, Serialize};
use zkid_core::Timestamp;

/// State of an authentication session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No challenge yet.
    Idle,
    /// A challenge is stored and can be proven.
    ChallengeIssued,
    /// A proof for the stored challenge is ready.
    ProofGenerated,
    /// The proof was sent to the verifier.
    Submitted,
    /// The verifier accepted the proof.
    Verified,
    /// Proof generation failed, or the verifier rejected the proof or
    /// could not be reached.
    Failed,
    /// The holder abandoned the challenge.
    Cancelled,
    /// The challenge outlived its expiry.
    Expired,
}

impl SessionState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Verified | SessionState::Failed | SessionState::Cancelled | SessionState::Expired
        )
    }

    /// Whether a challenge is stored.
    pub fn has_challenge(&self) -> bool {
        matches!(self, SessionState::ChallengeIssued | SessionState::ProofGenerated)
    }

    /// Whether `self → to` is an edge of the state graph.
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, ChallengeIssued)
                | (ChallengeIssued, ProofGenerated)
                | (ChallengeIssued, Cancelled)
                | (ChallengeIssued, Expired)
                | (ChallengeIssued, Failed)
                | (ProofGenerated, Submitted)
                | (ProofGenerated, Cancelled)
                | (ProofGenerated, Expired)
                | (Submitted, Verified)
                | (Submitted, Failed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "IDLE",
            SessionState::ChallengeIssued => "CHALLENGE_ISSUED",
            SessionState::ProofGenerated => "PROOF_GENERATED",
            SessionState::Submitted => "SUBMITTED",
            SessionState::Verified => "VERIFIED",
            SessionState::Failed => "FAILED",
            SessionState::Cancelled => "CANCELLED",
            SessionState::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Record of a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTransition {
    /// State before.
    pub from: SessionState,
    /// State after.
    pub to: SessionState,
    /// When it happened.
    pub at: Timestamp,
    /// Why.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            SessionState::Idle,
            SessionState::ChallengeIssued,
            SessionState::ProofGenerated,
            SessionState::Submitted,
            SessionState::Verified,
            SessionState::Failed,
            SessionState::Cancelled,
            SessionState::Expired,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)), "{from} has an exit");
        }
    }

    #[test]
    fn cancel_only_while_holding_a_challenge() {
        assert!(SessionState::ChallengeIssued.can_transition_to(SessionState::Cancelled));
        assert!(SessionState::ProofGenerated.can_transition_to(SessionState::Cancelled));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Cancelled));
        assert!(!SessionState::Submitted.can_transition_to(SessionState::Cancelled));
    }

    #[test]
    fn failure_edges() {
        assert!(SessionState::ChallengeIssued.can_transition_to(SessionState::Failed));
        assert!(SessionState::Submitted.can_transition_to(SessionState::Failed));
        assert!(!SessionState::ProofGenerated.can_transition_to(SessionState::Failed));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Failed));
    }

    #[test]
    fn display_and_serde_agree() {
        let s = SessionState::ChallengeIssued;
        assert_eq!(serde_json::to_value(s).unwrap(), serde_json::json!(s.to_string()));
    }
}
