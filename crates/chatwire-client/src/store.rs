//! Conversation store backed by the remote API.
//!
//! [`ConversationStore`] is the seam between the streaming core and the
//! backend's CRUD surface. The reply coordinator only needs
//! [`ConversationStore::send_message`]; the rest serves callers such as the CLI.

use async_trait::async_trait;
use chatwire_core::ConversationId;

use crate::endpoints;
use crate::error::Result;
use crate::transport::{RequestDescriptor, Transport};
use crate::types::{
    ChatModel, Conversation, ConversationMeta, CreateConversationRequest,
    CreateConversationResponse, Message, Page, SendMessageRequest, UpdateConversationRequest,
};

/// Access to conversations and messages on the backend.
///
/// This trait abstracts the remote repository, allowing for
/// in-memory implementations in tests.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// List the models the backend offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn list_models(&self) -> Result<Vec<ChatModel>>;

    /// List one page of conversation summaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn list_conversations(
        &self,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ConversationMeta>>;

    /// Fetch a conversation with its messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the conversation does not exist.
    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation>;

    /// List one page of a conversation's messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn list_messages(
        &self,
        id: &ConversationId,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Message>>;

    /// Create a conversation, optionally seeded with a first user message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn create_conversation(
        &self,
        model_id: &str,
        first_message: Option<&str>,
    ) -> Result<Conversation>;

    /// Apply a partial update to a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the conversation does not exist.
    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: UpdateConversationRequest,
    ) -> Result<Conversation>;

    /// Delete a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<()>;

    /// Duplicate a conversation and return the copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the conversation does not exist.
    async fn duplicate_conversation(&self, id: &ConversationId) -> Result<Conversation>;

    /// Prepare the request that appends `text` as a user message.
    ///
    /// The request is returned unsent: its response is the reply stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built.
    async fn send_message(&self, id: &ConversationId, text: &str) -> Result<RequestDescriptor>;
}

/// [`ConversationStore`] over the backend's HTTP API.
#[derive(Debug, Clone)]
pub struct RemoteConversationStore {
    transport: Transport,
}

impl RemoteConversationStore {
    /// Create a store on top of `transport`.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

#[async_trait]
impl ConversationStore for RemoteConversationStore {
    async fn list_models(&self) -> Result<Vec<ChatModel>> {
        self.transport.execute(&endpoints::list_models()).await
    }

    async fn list_conversations(
        &self,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ConversationMeta>> {
        self.transport
            .execute(&endpoints::list_conversations(limit, cursor))
            .await
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        self.transport
            .execute(&endpoints::get_conversation(id))
            .await
    }

    async fn list_messages(
        &self,
        id: &ConversationId,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Message>> {
        self.transport
            .execute(&endpoints::list_messages(id, limit, cursor))
            .await
    }

    async fn create_conversation(
        &self,
        model_id: &str,
        first_message: Option<&str>,
    ) -> Result<Conversation> {
        let request = CreateConversationRequest {
            model_id: model_id.to_string(),
            first_message: first_message.map(String::from),
        };
        let response: CreateConversationResponse = self
            .transport
            .execute(&endpoints::create_conversation(request))
            .await?;

        tracing::debug!(conversation_id = %response.conversation.id, "Created conversation");
        Ok(response.conversation)
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: UpdateConversationRequest,
    ) -> Result<Conversation> {
        self.transport
            .execute(&endpoints::update_conversation(id, update))
            .await
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        self.transport
            .execute_void(&endpoints::delete_conversation(id))
            .await?;
        tracing::debug!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    async fn duplicate_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        self.transport
            .execute(&endpoints::duplicate_conversation(id))
            .await
    }

    async fn send_message(&self, id: &ConversationId, text: &str) -> Result<RequestDescriptor> {
        self.transport
            .build(&endpoints::send_message(id, SendMessageRequest::user(text)))
    }
}
