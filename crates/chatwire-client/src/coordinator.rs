//! Streams assistant replies and narrates each run to a sink.
//!
//! [`ReplyCoordinator::stream_reply`] sends the user message, registers a
//! cancellable run for the conversation and spawns a task that feeds the
//! decoded events into a [`ReplySink`]. Every run ends with exactly one of
//! `on_done` or `on_error`. A cancelled run always ends with `on_done`.

use std::sync::Arc;

use chatwire_core::ConversationId;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::phase::{PhaseBoard, PhaseKey, RequestPhase};
use crate::registry::{RunId, StreamRegistry};
use crate::session::StreamSession;
use crate::sse::StreamEvent;
use crate::store::{ConversationStore, RemoteConversationStore};
use crate::transport::Transport;

// =============================================================================
// Sinks
// =============================================================================

/// Receives the lifecycle of one reply run.
///
/// `on_delta` may be called any number of times, then exactly one of
/// `on_done` or `on_error`. Calls arrive on the run's task; implementations
/// decide where to forward them.
pub trait ReplySink: Send + Sync + 'static {
    /// A chunk of reply text arrived.
    fn on_delta(&self, text: &str);

    /// The run finished, normally or by cancellation.
    fn on_done(&self);

    /// The run failed.
    fn on_error(&self, error: ClientError);
}

impl<T: ReplySink + ?Sized> ReplySink for Arc<T> {
    fn on_delta(&self, text: &str) {
        (**self).on_delta(text);
    }

    fn on_done(&self) {
        (**self).on_done();
    }

    fn on_error(&self, error: ClientError) {
        (**self).on_error(error);
    }
}

/// A reply lifecycle callback, as a value.
#[derive(Debug)]
pub enum ReplyEvent {
    /// See [`ReplySink::on_delta`].
    Delta(String),
    /// See [`ReplySink::on_done`].
    Done,
    /// See [`ReplySink::on_error`].
    Error(ClientError),
}

impl ReplySink for mpsc::UnboundedSender<ReplyEvent> {
    fn on_delta(&self, text: &str) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(ReplyEvent::Delta(text.to_string()));
    }

    fn on_done(&self) {
        let _ = self.send(ReplyEvent::Done);
    }

    fn on_error(&self, error: ClientError) {
        let _ = self.send(ReplyEvent::Error(error));
    }
}

type DeltaFn = Box<dyn Fn(&str) + Send + Sync>;
type DoneFn = Box<dyn Fn() + Send + Sync>;
type ErrorFn = Box<dyn Fn(ClientError) + Send + Sync>;

/// A [`ReplySink`] built from three closures.
pub struct CallbackSink {
    on_delta: DeltaFn,
    on_done: DoneFn,
    on_error: ErrorFn,
}

impl CallbackSink {
    /// Create a sink from its three callbacks.
    pub fn new(
        on_delta: impl Fn(&str) + Send + Sync + 'static,
        on_done: impl Fn() + Send + Sync + 'static,
        on_error: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_delta: Box::new(on_delta),
            on_done: Box::new(on_done),
            on_error: Box::new(on_error),
        }
    }
}

impl ReplySink for CallbackSink {
    fn on_delta(&self, text: &str) {
        (self.on_delta)(text);
    }

    fn on_done(&self) {
        (self.on_done)();
    }

    fn on_error(&self, error: ClientError) {
        (self.on_error)(error);
    }
}

// =============================================================================
// Runs
// =============================================================================

/// Everything one spawned run needs to resolve itself.
struct Run {
    id: ConversationId,
    run: RunId,
    cancel: CancellationToken,
    registry: Arc<StreamRegistry>,
    phases: Arc<PhaseBoard>,
    sink: Arc<dyn ReplySink>,
}

impl Run {
    /// Feed `events` to the sink until done, error, end of stream or cancellation.
    async fn drive<E>(self, mut events: E)
    where
        E: Stream<Item = Result<StreamEvent>> + Unpin,
    {
        loop {
            let next = events.next().await;
            if self.cancel.is_cancelled() {
                self.finish();
                return;
            }

            match next {
                Some(Ok(StreamEvent::DeltaText(text))) => self.sink.on_delta(&text),
                Some(Ok(StreamEvent::Done)) | None => {
                    self.finish();
                    return;
                }
                Some(Ok(StreamEvent::Malformed(payload))) => {
                    tracing::warn!(
                        conversation_id = %self.id,
                        run = %self.run,
                        payload = %payload,
                        "Dropping malformed stream frame"
                    );
                }
                Some(Err(err)) => {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    /// Resolve through the done path.
    fn finish(&self) {
        self.registry.complete_then(&self.id, self.run, || {
            self.phases.set(self.id, RequestPhase::Idle);
        });
        self.sink.on_done();
    }

    /// Resolve through the error path, unless the run was cancelled or displaced.
    fn fail(&self, err: ClientError) {
        let failed = !self.cancel.is_cancelled()
            && self.registry.complete_then(&self.id, self.run, || {
                self.phases.set(self.id, RequestPhase::Error(err.to_string()));
            });
        if !failed {
            tracing::debug!(conversation_id = %self.id, run = %self.run, error = %err, "Error after cancellation ignored");
            self.sink.on_done();
            return;
        }

        tracing::warn!(conversation_id = %self.id, run = %self.run, error = %err, "Reply stream failed");
        self.sink.on_error(err);
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Sends user messages and streams the assistant's replies.
pub struct ReplyCoordinator<S: ConversationStore> {
    store: Arc<S>,
    session: StreamSession,
    registry: Arc<StreamRegistry>,
    phases: Arc<PhaseBoard>,
}

impl ReplyCoordinator<RemoteConversationStore> {
    /// Create a coordinator talking to the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` for an unusable base address, or `Config` if an
    /// HTTP client cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = Transport::new(config)?;
        let session = StreamSession::new(config)?;
        Ok(Self::new(
            Arc::new(RemoteConversationStore::new(transport)),
            session,
        ))
    }
}

impl<S: ConversationStore> ReplyCoordinator<S> {
    /// Create a coordinator over `store`, opening streams with `session`.
    #[must_use]
    pub fn new(store: Arc<S>, session: StreamSession) -> Self {
        Self {
            store,
            session,
            registry: Arc::new(StreamRegistry::new()),
            phases: Arc::new(PhaseBoard::new()),
        }
    }

    /// Use a caller-owned phase board.
    #[must_use]
    pub fn with_phases(mut self, phases: Arc<PhaseBoard>) -> Self {
        self.phases = phases;
        self
    }

    /// The conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The stream registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// The phase board.
    #[must_use]
    pub fn phases(&self) -> &Arc<PhaseBoard> {
        &self.phases
    }

    /// Send `text` to conversation `id` and stream the reply into `sink`.
    ///
    /// Any run already streaming into `id` is cancelled first. Returns the
    /// new run, or `None` if nothing was started: blank text is ignored
    /// without callbacks, and a failed send is reported through `on_error`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn stream_reply(
        &self,
        id: ConversationId,
        text: &str,
        sink: impl ReplySink,
    ) -> Option<RunId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.phases.set(id, RequestPhase::Sending);
        let descriptor = match self.store.send_message(&id, text).await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::warn!(conversation_id = %id, error = %err, "Failed to send message");
                self.phases.set(id, RequestPhase::Error(err.to_string()));
                sink.on_error(err);
                return None;
            }
        };

        let cancel = CancellationToken::new();
        let run = self.registry.start_then(id, cancel.clone(), |_| {
            self.phases.set(id, RequestPhase::Streaming);
        });

        let task = Run {
            id,
            run,
            cancel,
            registry: Arc::clone(&self.registry),
            phases: Arc::clone(&self.phases),
            sink: Arc::new(sink),
        };
        let session = self.session.clone();

        tokio::spawn(async move {
            match session.open(&descriptor, task.cancel.clone()).await {
                Ok(events) => task.drive(events).await,
                Err(err) => task.fail(err),
            }
        });

        Some(run)
    }

    /// Create a conversation with `model_id` and stream the reply to `text`.
    ///
    /// The pending-new phase tracks the request until the conversation
    /// exists. Returns the new conversation's ID, or `None` if creation
    /// failed (reported through `on_error`) or `text` is blank.
    pub async fn submit_new(
        &self,
        model_id: &str,
        text: &str,
        sink: impl ReplySink,
    ) -> Option<ConversationId> {
        if text.trim().is_empty() {
            return None;
        }

        self.phases.set(PhaseKey::PendingNew, RequestPhase::Sending);
        let conversation = match self.store.create_conversation(model_id, None).await {
            Ok(conversation) => conversation,
            Err(err) => {
                tracing::warn!(model_id = %model_id, error = %err, "Failed to create conversation");
                self.phases
                    .set(PhaseKey::PendingNew, RequestPhase::Error(err.to_string()));
                sink.on_error(err);
                return None;
            }
        };

        self.phases.promote_pending(conversation.id);
        self.stream_reply(conversation.id, text, sink).await;
        Some(conversation.id)
    }

    /// Stop the reply streaming into `id`, if any. Returns whether one was active.
    ///
    /// The stopped run still resolves through `on_done`.
    pub fn stop(&self, id: &ConversationId) -> bool {
        self.registry.stop_then(id, |stopped| {
            if stopped || self.phases.in_flight(*id) {
                self.phases.set(*id, RequestPhase::Idle);
            }
        })
    }

    /// Stop every reply stream.
    pub fn stop_all(&self) {
        let mut settled = 0;
        let stopped = self
            .registry
            .stop_all_then(|_| settled = self.phases.settle_in_flight());
        tracing::debug!(streams = stopped.len(), phases = settled, "Stopped all replies");
    }

    /// Check whether a reply is streaming into `id`.
    #[must_use]
    pub fn is_streaming(&self, id: &ConversationId) -> bool {
        self.registry.is_active(id)
    }

    /// Stop any reply for `id`, delete the conversation and forget its phase.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the deletion fails.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        self.stop(id);
        self.store.delete_conversation(id).await?;
        self.phases.remove(*id);
        Ok(())
    }
}
