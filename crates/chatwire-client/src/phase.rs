//! Per-conversation request phases.

use std::collections::HashMap;
use std::fmt;

use chatwire_core::ConversationId;
use parking_lot::Mutex;

/// Lifecycle of the request in flight for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestPhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// The user message is being sent.
    Sending,
    /// The reply is streaming in.
    Streaming,
    /// The last request failed.
    Error(String),
}

impl RequestPhase {
    /// Check if a request is sending or streaming.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// The failure message, if this is an error phase.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Sending => write!(f, "sending"),
            Self::Streaming => write!(f, "streaming"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// What a phase is tracked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKey {
    /// An existing conversation.
    Conversation(ConversationId),
    /// A conversation that is about to be created.
    PendingNew,
}

impl From<ConversationId> for PhaseKey {
    fn from(id: ConversationId) -> Self {
        Self::Conversation(id)
    }
}

/// Shared map of request phases.
///
/// Keys that were never set read as [`RequestPhase::Idle`].
#[derive(Debug, Default)]
pub struct PhaseBoard {
    phases: Mutex<HashMap<PhaseKey, RequestPhase>>,
}

impl PhaseBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase for `key`.
    #[must_use]
    pub fn phase(&self, key: impl Into<PhaseKey>) -> RequestPhase {
        self.phases
            .lock()
            .get(&key.into())
            .cloned()
            .unwrap_or_default()
    }

    /// Set the phase for `key`.
    pub fn set(&self, key: impl Into<PhaseKey>, phase: RequestPhase) {
        let key = key.into();
        tracing::debug!(key = ?key, phase = %phase, "Request phase changed");
        self.phases.lock().insert(key, phase);
    }

    /// Forget `key`, e.g. after its conversation was deleted.
    pub fn remove(&self, key: impl Into<PhaseKey>) {
        self.phases.lock().remove(&key.into());
    }

    /// Move the pending-new phase onto the conversation just created for it.
    pub fn promote_pending(&self, id: ConversationId) {
        let mut phases = self.phases.lock();
        let phase = phases.remove(&PhaseKey::PendingNew).unwrap_or_default();
        phases.insert(PhaseKey::Conversation(id), phase);
    }

    /// Check if `key` has a request sending or streaming.
    #[must_use]
    pub fn in_flight(&self, key: impl Into<PhaseKey>) -> bool {
        self.phases
            .lock()
            .get(&key.into())
            .is_some_and(RequestPhase::is_in_flight)
    }

    /// The error message for `key`, if its last request failed.
    #[must_use]
    pub fn error_message(&self, key: impl Into<PhaseKey>) -> Option<String> {
        self.phases
            .lock()
            .get(&key.into())
            .and_then(|phase| phase.error_message().map(String::from))
    }

    /// Reset every in-flight phase to idle. Returns how many were reset.
    pub fn settle_in_flight(&self) -> usize {
        let mut phases = self.phases.lock();
        let mut count = 0;
        for phase in phases.values_mut().filter(|phase| phase.is_in_flight()) {
            *phase = RequestPhase::Idle;
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_idle() {
        let board = PhaseBoard::new();
        assert_eq!(board.phase(ConversationId::generate()), RequestPhase::Idle);
        assert_eq!(board.phase(PhaseKey::PendingNew), RequestPhase::Idle);
    }

    #[test]
    fn set_and_read_back() {
        let board = PhaseBoard::new();
        let id = ConversationId::generate();

        board.set(id, RequestPhase::Streaming);
        assert!(board.in_flight(id));

        board.set(id, RequestPhase::Error("HTTP error: 500".into()));
        assert!(!board.in_flight(id));
        assert_eq!(board.error_message(id).as_deref(), Some("HTTP error: 500"));

        board.remove(id);
        assert_eq!(board.phase(id), RequestPhase::Idle);
    }

    #[test]
    fn promote_pending_moves_phase() {
        let board = PhaseBoard::new();
        let id = ConversationId::generate();
        board.set(PhaseKey::PendingNew, RequestPhase::Sending);

        board.promote_pending(id);

        assert_eq!(board.phase(id), RequestPhase::Sending);
        assert_eq!(board.phase(PhaseKey::PendingNew), RequestPhase::Idle);
    }

    #[test]
    fn settle_in_flight_keeps_errors() {
        let board = PhaseBoard::new();
        let sending = ConversationId::generate();
        let failed = ConversationId::generate();
        board.set(sending, RequestPhase::Sending);
        board.set(PhaseKey::PendingNew, RequestPhase::Streaming);
        board.set(failed, RequestPhase::Error("boom".into()));

        assert_eq!(board.settle_in_flight(), 2);
        assert_eq!(board.phase(sending), RequestPhase::Idle);
        assert_eq!(board.phase(PhaseKey::PendingNew), RequestPhase::Idle);
        assert_eq!(board.error_message(failed).as_deref(), Some("boom"));
    }

    #[test]
    fn phase_display() {
        assert_eq!(RequestPhase::Streaming.to_string(), "streaming");
        assert_eq!(RequestPhase::Error("x".into()).to_string(), "error: x");
    }
}
