//! Streaming chat-completion client.
//!
//! This crate talks to a chat backend over HTTP and streams assistant replies
//! from its `text/event-stream` responses:
//!
//! - **Transport**: resolves [`Endpoint`]s against a base address, executes
//!   JSON calls, or builds a [`RequestDescriptor`] for streaming
//! - **Frames**: [`FrameParser`] turns raw bytes into [`StreamEvent`]s
//! - **Sessions**: [`StreamSession`] owns one streaming request
//! - **Registry**: [`StreamRegistry`] keeps at most one stream per conversation
//! - **Coordinator**: [`ReplyCoordinator`] sends a message, streams the reply
//!   into a [`ReplySink`] and tracks each conversation's [`RequestPhase`]
//!
//! # Example
//!
//! ```no_run
//! use chatwire_client::{ClientConfig, ReplyCoordinator, ReplyEvent};
//! use chatwire_core::ConversationId;
//!
//! # async fn run() -> chatwire_client::Result<()> {
//! let coordinator = ReplyCoordinator::from_config(&ClientConfig::default())?;
//! let id: ConversationId = "9f1b2c3d-4e5f-4a6b-8c7d-0e1f2a3b4c5d".parse().unwrap();
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! coordinator.stream_reply(id, "Hello", tx).await;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         ReplyEvent::Delta(text) => print!("{text}"),
//!         ReplyEvent::Done => break,
//!         ReplyEvent::Error(err) => return Err(err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod endpoints;
pub mod error;
pub mod phase;
pub mod registry;
pub mod session;
pub mod sse;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use coordinator::{CallbackSink, ReplyCoordinator, ReplyEvent, ReplySink};
pub use error::{ClientError, Result};
pub use phase::{PhaseBoard, PhaseKey, RequestPhase};
pub use registry::{ActiveStream, RunId, StreamRegistry};
pub use session::{EventStream, StreamSession};
pub use sse::{FrameParser, StreamEvent, StreamPayload};
pub use store::{ConversationStore, RemoteConversationStore};
pub use transport::{Endpoint, RequestDescriptor, Transport};
pub use types::{
    ChatModel, Conversation, ConversationMeta, CreateConversationRequest,
    CreateConversationResponse, Message, Page, Role, SendMessageRequest,
    UpdateConversationRequest,
};
