//! # Session Events
//!
//! A session reports progress as [`SessionEvent`]s to the observers
//! attached to it. Observers are adapters: the session knows nothing about
//! the UI, log sink or channel behind them.
//!
//! - [`TracingObserver`] logs every event.
//! - [`ChannelObserver`] forwards events to a `tokio` unbounded channel.
//! - Any `Fn(&SessionEvent) + Send + Sync` closure is an observer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::state::SessionState;
use crate::tracker::OperationKind;

/// Something that happened in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An operation started.
    Started {
        /// Operation.
        operation: OperationKind,
    },
    /// An operation succeeded.
    Succeeded {
        /// Operation.
        operation: OperationKind,
    },
    /// An operation failed.
    Failed {
        /// Operation.
        operation: OperationKind,
        /// Error message.
        error: String,
    },
    /// The session changed state.
    StateChanged {
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },
}

/// Receives session events.
pub trait SessionObserver: Send + Sync {
    /// Handle one event. Called with no session lock held.
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event)
    }
}

/// Logs events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { operation } => tracing::debug!(%operation, "session operation started"),
            SessionEvent::Succeeded { operation } => tracing::debug!(%operation, "session operation succeeded"),
            SessionEvent::Failed { operation, error } => {
                tracing::warn!(%operation, error = %error, "session operation failed")
            }
            SessionEvent::StateChanged { from, to } => tracing::info!(%from, %to, "session state changed"),
        }
    }
}

/// Forwards events to a channel. Events sent after the receiver is dropped
/// are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// An observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_event(&self, event: &SessionEvent) {
        let _ = self.tx.send(event.clone());
    }
}
