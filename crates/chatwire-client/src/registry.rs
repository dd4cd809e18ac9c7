//! Registry of active reply streams.
//!
//! At most one stream runs per conversation. Starting a stream for a
//! conversation that already has one cancels the old run and replaces it
//! under the same lock acquisition, so a caller never observes both.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chatwire_core::ConversationId;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Identifies one run of a stream, distinct across the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// The registered handle of a running stream.
#[derive(Debug, Clone)]
pub struct ActiveStream {
    /// Which run this is.
    pub run: RunId,
    /// Signals the run to stop at its next checkpoint.
    pub cancel: CancellationToken,
}

/// Maps each conversation to its single active stream.
///
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    active: Mutex<HashMap<ConversationId, ActiveStream>>,
    next_run: AtomicU64,
}

impl StreamRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run for `id`, cancelling and replacing any existing one.
    pub fn start(&self, id: ConversationId, cancel: CancellationToken) -> RunId {
        self.start_then(id, cancel, |_| {})
    }

    /// [`start`](Self::start), then run `then` before the lock is released.
    ///
    /// `then` must not call back into the registry.
    pub fn start_then(
        &self,
        id: ConversationId,
        cancel: CancellationToken,
        then: impl FnOnce(RunId),
    ) -> RunId {
        let run = RunId(self.next_run.fetch_add(1, Ordering::Relaxed));
        let mut active = self.active.lock();

        if let Some(previous) = active.remove(&id) {
            previous.cancel.cancel();
            tracing::info!(conversation_id = %id, displaced = %previous.run, run = %run, "Replacing active stream");
        } else {
            tracing::info!(conversation_id = %id, run = %run, "Starting stream");
        }

        active.insert(id, ActiveStream { run, cancel });
        then(run);
        run
    }

    /// Cancel and remove the stream for `id`. Returns whether one was active.
    pub fn stop(&self, id: &ConversationId) -> bool {
        self.stop_then(id, |_| {})
    }

    /// [`stop`](Self::stop), then run `then` with the result before the lock
    /// is released.
    ///
    /// `then` must not call back into the registry.
    pub fn stop_then(&self, id: &ConversationId, then: impl FnOnce(bool)) -> bool {
        let mut active = self.active.lock();
        let stopped = match active.remove(id) {
            Some(stream) => {
                stream.cancel.cancel();
                tracing::info!(conversation_id = %id, run = %stream.run, "Stopped stream");
                true
            }
            None => false,
        };
        then(stopped);
        stopped
    }

    /// Cancel every stream and clear the registry. Returns the affected conversations.
    pub fn stop_all(&self) -> Vec<ConversationId> {
        self.stop_all_then(|_| {})
    }

    /// [`stop_all`](Self::stop_all), then run `then` with the affected
    /// conversations before the lock is released.
    ///
    /// `then` must not call back into the registry.
    pub fn stop_all_then(&self, then: impl FnOnce(&[ConversationId])) -> Vec<ConversationId> {
        let mut active = self.active.lock();
        let mut stopped = Vec::with_capacity(active.len());
        for (id, stream) in active.drain() {
            stream.cancel.cancel();
            stopped.push(id);
        }
        if !stopped.is_empty() {
            tracing::info!(count = stopped.len(), "Stopped all streams");
        }
        then(&stopped);
        stopped
    }

    /// Check whether `id` has an active stream.
    #[must_use]
    pub fn is_active(&self, id: &ConversationId) -> bool {
        self.active.lock().contains_key(id)
    }

    /// Remove `run` from `id` once it finishes on its own.
    ///
    /// Returns `false` if `run` is no longer the registered run, in which
    /// case the entry is left untouched.
    pub fn complete(&self, id: &ConversationId, run: RunId) -> bool {
        self.complete_then(id, run, || {})
    }

    /// [`complete`](Self::complete), running `then` under the lock only if
    /// `run` was the registered run.
    ///
    /// `then` must not call back into the registry.
    pub fn complete_then(&self, id: &ConversationId, run: RunId, then: impl FnOnce()) -> bool {
        let mut active = self.active.lock();
        match active.get(id) {
            Some(stream) if stream.run == run => {
                active.remove(id);
                tracing::debug!(conversation_id = %id, run = %run, "Stream completed");
                then();
                true
            }
            _ => false,
        }
    }

    /// The registered run for `id`, if any.
    #[must_use]
    pub fn current(&self, id: &ConversationId) -> Option<RunId> {
        self.active.lock().get(id).map(|stream| stream.run)
    }

    /// Number of active streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Check if no stream is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}
