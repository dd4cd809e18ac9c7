//! Plain-text rendering for listings.

use chatwire_client::{ChatModel, ConversationMeta, Message};

/// Longest snippet shown for a conversation's last message.
const SNIPPET_LEN: usize = 60;

/// One line per model: `id  name  description`.
pub fn model_line(model: &ChatModel) -> String {
    match &model.description {
        Some(description) => format!("{:<16}  {}  {}", model.id, model.name, description),
        None => format!("{:<16}  {}", model.id, model.name),
    }
}

/// One line per conversation, pinned ones marked with `*`.
pub fn conversation_line(meta: &ConversationMeta) -> String {
    let pin = if meta.is_pinned { '*' } else { ' ' };
    let mut line = format!(
        "{pin} {}  {}  [{}, {}]",
        meta.id,
        meta.title,
        meta.model_id,
        meta.updated_at.format("%Y-%m-%d %H:%M"),
    );
    if let Some(message) = &meta.last_message {
        line.push_str("\n    ");
        line.push_str(&snippet(&message.text));
    }
    line
}

/// A message with its role and timestamp header.
pub fn message_block(message: &Message) -> String {
    format!(
        "[{} {}]\n{}\n",
        message.role.as_str(),
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.text.trim_end(),
    )
}

/// First line of `text`, shortened to [`SNIPPET_LEN`] characters.
fn snippet(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default().trim();
    if first.chars().count() > SNIPPET_LEN {
        let cut: String = first.chars().take(SNIPPET_LEN).collect();
        format!("{cut}…")
    } else {
        first.to_string()
    }
}
