//! Per-operation loading flag and last error.
//!
//! Every session operation is bracketed by [`OperationTracker::begin`] and
//! either [`succeed`](OperationTracker::succeed), which clears the last
//! error, or [`fail`](OperationTracker::fail), which records it.

use serde::{Deserialize, Serialize};

/// The session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Fetching or accepting a challenge.
    RequestChallenge,
    /// Proving.
    GenerateProof,
    /// Posting the proof.
    Submit,
    /// Abandoning the challenge.
    Cancel,
}

impl OperationKind {
    /// All kinds.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::RequestChallenge,
        OperationKind::GenerateProof,
        OperationKind::Submit,
        OperationKind::Cancel,
    ];

    fn index(self) -> usize {
        match self {
            OperationKind::RequestChallenge => 0,
            OperationKind::GenerateProof => 1,
            OperationKind::Submit => 2,
            OperationKind::Cancel => 3,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::RequestChallenge => "request_challenge",
            OperationKind::GenerateProof => "generate_proof",
            OperationKind::Submit => "submit",
            OperationKind::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Status of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    /// Number of calls in flight.
    pub in_flight: usize,
    /// Error of the most recent failed call, cleared by the next success.
    pub last_error: Option<String>,
}

impl OperationStatus {
    /// Whether a call is in flight.
    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }
}

/// Status of every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationTracker {
    statuses: [OperationStatus; 4],
}

impl OperationTracker {
    /// All idle, no errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a call started.
    pub fn begin(&mut self, kind: OperationKind) {
        self.statuses[kind.index()].in_flight += 1;
    }

    /// Mark a call finished successfully.
    pub fn succeed(&mut self, kind: OperationKind) {
        let s = &mut self.statuses[kind.index()];
        s.in_flight = s.in_flight.saturating_sub(1);
        s.last_error = None;
    }

    /// Mark a call failed.
    pub fn fail(&mut self, kind: OperationKind, error: impl Into<String>) {
        let s = &mut self.statuses[kind.index()];
        s.in_flight = s.in_flight.saturating_sub(1);
        s.last_error = Some(error.into());
    }

    /// Status of `kind`.
    pub fn status(&self, kind: OperationKind) -> &OperationStatus {
        &self.statuses[kind.index()]
    }

    /// Whether `kind` has a call in flight.
    pub fn is_loading(&self, kind: OperationKind) -> bool {
        self.status(kind).loading()
    }

    /// Last error of `kind`.
    pub fn last_error(&self, kind: OperationKind) -> Option<&str> {
        self.status(kind).last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_cleared_by_next_success() {
        let mut t = OperationTracker::new();
        t.begin(OperationKind::Submit);
        assert!(t.is_loading(OperationKind::Submit));
        t.fail(OperationKind::Submit, "verifier unreachable");
        assert!(!t.is_loading(OperationKind::Submit));
        assert_eq!(t.last_error(OperationKind::Submit), Some("verifier unreachable"));

        t.begin(OperationKind::Submit);
        t.succeed(OperationKind::Submit);
        assert_eq!(t.last_error(OperationKind::Submit), None);
    }

    #[test]
    fn kinds_are_independent() {
        let mut t = OperationTracker::new();
        t.begin(OperationKind::GenerateProof);
        t.fail(OperationKind::Cancel, "nothing to cancel");
        assert!(t.is_loading(OperationKind::GenerateProof));
        assert!(!t.is_loading(OperationKind::Cancel));
        assert_eq!(t.last_error(OperationKind::GenerateProof), None);
    }

    #[test]
    fn overlapping_calls_keep_loading() {
        let mut t = OperationTracker::new();
        t.begin(OperationKind::GenerateProof);
        t.begin(OperationKind::GenerateProof);
        t.succeed(OperationKind::GenerateProof);
        assert!(t.is_loading(OperationKind::GenerateProof));
        t.fail(OperationKind::GenerateProof, "invalid challenge");
        assert!(!t.is_loading(OperationKind::GenerateProof));
    }
}
