//! Wire types for the chat backend API.
//!
//! Field names are camelCase on the wire; timestamps are RFC 3339.

use chatwire_core::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Message Types
// =============================================================================

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model's replies.
    Assistant,
    /// System prompts.
    System,
}

impl Role {
    /// Wire string for the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse a role leniently. Unknown roles are treated as `User`.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// A message as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Full message text.
    pub text: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the message is pinned.
    #[serde(default)]
    pub is_pinned: bool,
    /// Whether the message was edited after sending.
    #[serde(default)]
    pub is_edited: bool,
}

/// Request body for appending a message to a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// Author; always `user` from this client.
    pub role: Role,
    /// Message text.
    pub text: String,
}

impl SendMessageRequest {
    /// A user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

// =============================================================================
// Conversation Types
// =============================================================================

/// Conversation summary as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMeta {
    /// Conversation ID.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Model used for replies.
    pub model_id: String,
    /// Whether the conversation is pinned.
    pub is_pinned: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Most recent message, if any.
    #[serde(default)]
    pub last_message: Option<Message>,
}

/// A full conversation with its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Model used for replies.
    pub model_id: String,
    /// Whether the conversation is pinned.
    pub is_pinned: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Timestamp of the latest activity: the last message, else the update time.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.messages
            .last()
            .map_or(self.updated_at, |message| message.created_at)
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Request body for creating a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Model to use for replies.
    pub model_id: String,
    /// Optional first user message.
    pub first_message: Option<String>,
}

/// Response from the create endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationResponse {
    /// The created conversation.
    pub conversation: Conversation,
}

/// Partial update of a conversation. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversationRequest {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// New pinned flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

// =============================================================================
// Model Types
// =============================================================================

/// A chat model offered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatModel {
    /// Model identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}
