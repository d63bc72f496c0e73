use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{ DateTime, NaiveDateTime, TimeZone, Utc };
use log::{ debug, error, info };
use reqwest::cookie::{ CookieStore, Jar };
use reqwest::header::REFERER;
use reqwest::redirect::Policy;
use reqwest::{ Client as HttpClient, StatusCode };
use serde::{ Deserialize, Serialize };
use url::Url;

use super::csrf::{ self, CSRF_COOKIE, CSRF_HEADER };
use super::{ ApiError, AuthOutcome, ChatApi, SendReply };
use crate::models::chat::{ sort_groups, ChatMessage, ConversationGroup, ConversationSummary, Role };

/// HTTP adapter for the chatBot server. Session and CSRF cookies live in
/// the shared jar; redirects are never followed so an auth redirect is
/// visible to the caller instead of silently landing on the login page.
pub struct HttpChatApi {
    http: HttpClient,
    jar: Arc<Jar>,
    base: Url,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    status: String,
    ai_response: Option<String>,
    conversation_id: Option<IdValue>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    conversations: HashMap<String, Vec<WireSummary>>,
}

#[derive(Deserialize)]
struct ConversationResponse {
    conversation: ConversationBody,
}

#[derive(Deserialize)]
struct ConversationBody {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    role: Role,
    content: String,
    timestamp: String,
}

#[derive(Deserialize)]
struct WireSummary {
    id: IdValue,
    preview: String,
    #[serde(default)]
    time_display: String,
}

/// Conversation ids arrive as integers from the database but travel as
/// strings everywhere in the client.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Int(i64),
    Str(String),
}

impl IdValue {
    fn into_string(self) -> String {
        match self {
            IdValue::Int(id) => id.to_string(),
            IdValue::Str(id) => id,
        }
    }
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base = Url::parse(&normalized)
            .map_err(|e| ApiError::Decode(format!("invalid server URL {base_url}: {e}")))?;

        let jar = Arc::new(Jar::default());
        let http = HttpClient::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .build()?;

        Ok(Self { http, jar, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    fn csrf_token_from_jar(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let header = header.to_str().ok()?;
        csrf::token_from_cookie_header(header, CSRF_COOKIE)
    }

    async fn fetch_auth_page(&self) -> Result<String, ApiError> {
        let url = self.endpoint("auth/")?;
        let body = self.http.get(url).send().await?.error_for_status()?.text().await?;
        Ok(body)
    }

    /// CSRF token for a form post: the cookie when present, otherwise the
    /// hidden field of a freshly fetched auth page.
    async fn form_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.csrf_token_from_jar() {
            return Ok(token);
        }
        let body = self.fetch_auth_page().await?;
        if let Some(token) = self.csrf_token_from_jar() {
            return Ok(token);
        }
        csrf::token_from_form_field(&body).ok_or(ApiError::Csrf)
    }

    async fn post_auth_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        fallback_error: &str
    ) -> Result<AuthOutcome, ApiError> {
        let url = self.endpoint(path)?;
        let referer = self.endpoint("auth/")?;
        let resp = self.http
            .post(url)
            .header(REFERER, referer.as_str())
            .form(fields)
            .send().await?;

        let status = resp.status();
        if status.is_redirection() {
            // The server redirects to the chat page on success.
            return Ok(AuthOutcome::Success);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Csrf);
        }
        let body = resp.error_for_status()?.text().await?;
        let mut errors = extract_form_errors(&body);
        if errors.is_empty() {
            errors.push(fallback_error.to_string());
        }
        Ok(AuthOutcome::FormErrors(errors))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status.is_redirection() || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth);
        }
        let resp = resp.error_for_status()?;
        resp.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn prime_session(&self) -> Result<(), ApiError> {
        self.fetch_auth_page().await?;
        debug!("session primed, CSRF cookie present: {}", self.csrf_token_from_jar().is_some());
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        let token = self.form_token().await?;
        info!("Signing in as {}", username);
        self.post_auth_form(
            "auth/login/",
            &[
                ("username", username),
                ("password", password),
                (csrf::CSRF_FORM_FIELD, &token),
            ],
            "Sign in failed. Check your username and password."
        ).await
    }

    async fn register(
        &self,
        username: &str,
        password1: &str,
        password2: &str
    ) -> Result<AuthOutcome, ApiError> {
        let token = self.form_token().await?;
        info!("Registering account {}", username);
        self.post_auth_form(
            "auth/register/",
            &[
                ("username", username),
                ("password1", password1),
                ("password2", password2),
                (csrf::CSRF_FORM_FIELD, &token),
            ],
            "Registration failed. Review the form and try again."
        ).await
    }

    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>
    ) -> Result<SendReply, ApiError> {
        let token = self.csrf_token_from_jar().ok_or(ApiError::Csrf)?;
        let url = self.endpoint("send_message/")?;
        let req = SendMessageRequest { message, conversation_id };

        let resp = self.http
            .post(url)
            .header(CSRF_HEADER, token)
            .header(REFERER, self.base.as_str())
            .json(&req)
            .send().await?;

        let status = resp.status();
        if status.is_redirection() || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth);
        }
        let resp = resp.error_for_status()?;
        let body = resp
            .json::<SendMessageResponse>().await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if body.status != "success" {
            let detail = body.message.unwrap_or_else(|| body.status.clone());
            return Err(ApiError::Application(detail));
        }
        let ai_response = body.ai_response
            .ok_or_else(|| ApiError::Decode("success response without ai_response".to_string()))?;

        Ok(SendReply {
            ai_response,
            conversation_id: body.conversation_id.map(IdValue::into_string),
        })
    }

    async fn current_messages(&self) -> Result<Vec<ChatMessage>, ApiError> {
        let body: MessagesResponse = self.get_json("get_messages/").await?;
        Ok(convert_messages(body.messages))
    }

    async fn conversation_history(&self) -> Result<Vec<ConversationGroup>, ApiError> {
        let body: HistoryResponse = self.get_json("api/conversations/history/").await?;
        let mut groups: Vec<ConversationGroup> = body.conversations
            .into_iter()
            .map(|(name, summaries)| ConversationGroup {
                name,
                conversations: summaries
                    .into_iter()
                    .map(|s| ConversationSummary {
                        id: s.id.into_string(),
                        preview: s.preview,
                        time_display: s.time_display,
                    })
                    .collect(),
            })
            .collect();
        sort_groups(&mut groups);
        Ok(groups)
    }

    async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let body: ConversationResponse = self.get_json(&format!("api/conversations/{id}/")).await?;
        Ok(convert_messages(body.conversation.messages))
    }
}

fn convert_messages(wire: Vec<WireMessage>) -> Vec<ChatMessage> {
    wire.into_iter()
        .filter_map(|msg| {
            match parse_timestamp(&msg.timestamp) {
                Some(timestamp) => Some(ChatMessage { role: msg.role, content: msg.content, timestamp }),
                None => {
                    error!("Dropping message with unparseable timestamp: {}", msg.timestamp);
                    None
                }
            }
        })
        .collect()
}

/// The server emits ISO-8601 timestamps, with or without a UTC offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Pull the text of every `auth-form-error` / `auth-message--error`
/// element out of a re-rendered auth page.
fn extract_form_errors(html: &str) -> Vec<String> {
    let mut errors = Vec::new();
    for class in ["auth-form-error", "auth-message--error"] {
        let mut rest = html;
        while let Some(at) = rest.find(class) {
            rest = &rest[at + class.len()..];
            let Some(gt) = rest.find('>') else { break };
            let after = &rest[gt + 1..];
            let Some(lt) = after.find('<') else { break };
            let text = after[..lt].trim();
            if !text.is_empty() {
                errors.push(text.to_string());
            }
            rest = after;
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let with_offset = parse_timestamp("2026-08-22T10:15:00+00:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2026-08-22T10:15:00+00:00");

        let naive = parse_timestamp("2026-08-22T10:15:00.123456").unwrap();
        assert_eq!(naive.timestamp(), with_offset.timestamp());

        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn extracts_error_text_from_rendered_form() {
        let html = r#"
            <div class="auth-form-error">Passwords do not match.</div>
            <p class="auth-message--error"> Username already taken. </p>
        "#;
        let errors = extract_form_errors(html);
        assert_eq!(
            errors,
            vec!["Passwords do not match.".to_string(), "Username already taken.".to_string()]
        );
    }

    #[test]
    fn clean_page_has_no_errors() {
        assert!(extract_form_errors("<div class=\"auth-form\"></div>").is_empty());
    }

    #[test]
    fn id_values_normalize_to_strings() {
        let int: IdValue = serde_json::from_str("42").unwrap();
        let text: IdValue = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(int.into_string(), "42");
        assert_eq!(text.into_string(), "42");
    }

    #[test]
    fn send_request_omits_missing_conversation_id() {
        let req = SendMessageRequest { message: "hi", conversation_id: None };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"message":"hi"}"#);

        let req = SendMessageRequest { message: "hi", conversation_id: Some("7") };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"message":"hi","conversation_id":"7"}"#
        );
    }
}
