pub mod csrf;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::chat::{ ChatMessage, ConversationGroup };

/// Everything that can go wrong talking to the server. Every variant
/// degrades to a user-visible message; none are retried automatically.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response parsed but the server reported failure.
    #[error("server rejected the request: {0}")]
    Application(String),

    #[error("not signed in or session expired")]
    Auth,

    #[error("CSRF token unavailable")]
    Csrf,

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Successful reply to a message send.
#[derive(Clone, Debug, PartialEq)]
pub struct SendReply {
    pub ai_response: String,
    /// Present when the server created a conversation for this message.
    pub conversation_id: Option<String>,
}

/// Result of a login/register form post. The server owns validation;
/// a 200 re-render with error markup becomes `FormErrors`.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthOutcome {
    Success,
    FormErrors(Vec<String>),
}

/// Seam between the UI and the chatBot server. The production
/// implementation is [`http::HttpChatApi`]; tests inject a mock.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch the auth page so the server sets the CSRF cookie.
    async fn prime_session(&self) -> Result<(), ApiError>;

    async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome, ApiError>;

    async fn register(
        &self,
        username: &str,
        password1: &str,
        password2: &str
    ) -> Result<AuthOutcome, ApiError>;

    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>
    ) -> Result<SendReply, ApiError>;

    /// Messages of the active server-side conversation (polling refresh).
    async fn current_messages(&self) -> Result<Vec<ChatMessage>, ApiError>;

    async fn conversation_history(&self) -> Result<Vec<ConversationGroup>, ApiError>;

    async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError>;
}
