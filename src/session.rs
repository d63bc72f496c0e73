use log::{ error, info };

use crate::api::{ ApiError, SendReply };
use crate::models::chat::{ ChatMessage, Role };

/// Shown in the assistant slot when a send fails. Failures are surfaced
/// once; the user resubmits manually.
pub const SEND_ERROR_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// One entry in the visible message list.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatItem {
    Message(ChatMessage),
    Error(String),
}

/// All mutable chat state, owned explicitly instead of living in module
/// globals. `conversation_id == None` means a new, unsaved conversation.
#[derive(Default)]
pub struct ChatSession {
    conversation_id: Option<String>,
    is_sending: bool,
    items: Vec<ChatItem>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    pub fn items(&self) -> &[ChatItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Start a send: trims the text, rejects empty input and rejects a
    /// second submit while one is outstanding. On acceptance the flag is
    /// set and the user message is rendered optimistically; the returned
    /// text is what must go over the wire.
    pub fn begin_send(&mut self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.is_sending {
            return None;
        }
        self.is_sending = true;
        self.items.push(ChatItem::Message(ChatMessage::new(Role::User, trimmed)));
        Some(trimmed.to_string())
    }

    /// Apply the outcome of the in-flight send. The sending flag is
    /// cleared on every path, success or failure. Returns true when the
    /// server introduced a conversation id the session did not have, in
    /// which case the caller refreshes the sidebar.
    pub fn finish_send(&mut self, result: Result<SendReply, ApiError>) -> bool {
        self.is_sending = false;
        match result {
            Ok(reply) => {
                self.items.push(
                    ChatItem::Message(ChatMessage::new(Role::Assistant, reply.ai_response))
                );
                if let Some(id) = reply.conversation_id {
                    if self.conversation_id.as_deref() != Some(id.as_str()) {
                        info!("Adopting conversation {}", id);
                        self.conversation_id = Some(id);
                        return true;
                    }
                }
                false
            }
            Err(err) => {
                error!("Message send failed: {}", err);
                self.items.push(ChatItem::Error(SEND_ERROR_TEXT.to_string()));
                false
            }
        }
    }

    /// Replace the visible list wholesale: conversation switch or polling
    /// refresh. The server copy is authoritative; any optimistic message
    /// is superseded, never duplicated.
    pub fn replace(&mut self, conversation_id: Option<String>, messages: Vec<ChatMessage>) {
        self.conversation_id = conversation_id;
        self.items = messages.into_iter().map(ChatItem::Message).collect();
    }

    /// Back to a new, unsaved conversation. Touches nothing server-side.
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.items.clear();
    }
}
