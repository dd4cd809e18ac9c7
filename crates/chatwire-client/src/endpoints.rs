//! Endpoint catalogue for the chat backend.

use chatwire_core::ConversationId;

use crate::transport::Endpoint;
use crate::types::{CreateConversationRequest, SendMessageRequest, UpdateConversationRequest};

// =============================================================================
// Conversations
// =============================================================================

/// `GET conversations?limit=&cursor=`
#[must_use]
pub fn list_conversations(limit: u32, cursor: Option<&str>) -> Endpoint {
    paginated(Endpoint::get("conversations"), limit, cursor)
}

/// `POST conversations`
#[must_use]
pub fn create_conversation(
    request: CreateConversationRequest,
) -> Endpoint<CreateConversationRequest> {
    Endpoint::post("conversations").json(request)
}

/// `GET conversations/{id}`
#[must_use]
pub fn get_conversation(id: &ConversationId) -> Endpoint {
    Endpoint::get(format!("conversations/{id}"))
}

/// `PATCH conversations/{id}`
#[must_use]
pub fn update_conversation(
    id: &ConversationId,
    request: UpdateConversationRequest,
) -> Endpoint<UpdateConversationRequest> {
    Endpoint::patch(format!("conversations/{id}")).json(request)
}

/// `DELETE conversations/{id}`
#[must_use]
pub fn delete_conversation(id: &ConversationId) -> Endpoint {
    Endpoint::delete(format!("conversations/{id}"))
}

/// `POST conversations/{id}/duplicate`
#[must_use]
pub fn duplicate_conversation(id: &ConversationId) -> Endpoint {
    Endpoint::post(format!("conversations/{id}/duplicate"))
}

// =============================================================================
// Messages
// =============================================================================

/// `GET conversations/{id}/messages?limit=&cursor=`
#[must_use]
pub fn list_messages(id: &ConversationId, limit: u32, cursor: Option<&str>) -> Endpoint {
    paginated(
        Endpoint::get(format!("conversations/{id}/messages")),
        limit,
        cursor,
    )
}

/// `POST conversations/{id}/messages`
///
/// The response is an event stream, not JSON.
#[must_use]
pub fn send_message(
    id: &ConversationId,
    request: SendMessageRequest,
) -> Endpoint<SendMessageRequest> {
    Endpoint::post(format!("conversations/{id}/messages")).json(request)
}

// =============================================================================
// Models
// =============================================================================

/// `GET models`
#[must_use]
pub fn list_models() -> Endpoint {
    Endpoint::get("models")
}

fn paginated(endpoint: Endpoint, limit: u32, cursor: Option<&str>) -> Endpoint {
    let endpoint = endpoint.query("limit", limit.to_string());
    match cursor {
        Some(cursor) => endpoint.query("cursor", cursor),
        None => endpoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn list_conversations_with_cursor() {
        let endpoint = list_conversations(10, Some("c2"));
        assert_eq!(endpoint.path(), "conversations");
        assert_eq!(
            endpoint.query_pairs(),
            [
                ("limit".to_string(), "10".to_string()),
                ("cursor".to_string(), "c2".to_string())
            ]
        );
    }

    #[test]
    fn list_messages_without_cursor() {
        let id = ConversationId::generate();
        let endpoint = list_messages(&id, 30, None);
        assert_eq!(endpoint.path(), format!("conversations/{id}/messages"));
        assert_eq!(endpoint.query_pairs().len(), 1);
    }

    #[test]
    fn conversation_paths_and_methods() {
        let id = ConversationId::generate();
        assert_eq!(*get_conversation(&id).method(), Method::GET);
        assert_eq!(*delete_conversation(&id).method(), Method::DELETE);
        assert_eq!(
            duplicate_conversation(&id).path(),
            format!("conversations/{id}/duplicate")
        );
        let update = update_conversation(&id, UpdateConversationRequest::default());
        assert_eq!(*update.method(), Method::PATCH);
    }

    #[test]
    fn send_message_posts_to_messages() {
        let id = ConversationId::generate();
        let endpoint = send_message(&id, SendMessageRequest::user("Hello"));
        assert_eq!(*endpoint.method(), Method::POST);
        assert_eq!(endpoint.path(), format!("conversations/{id}/messages"));
    }
}
