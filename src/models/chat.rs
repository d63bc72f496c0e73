use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

/// Message author. Two variants only; render logic switches on the tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One card in the sidebar. `time_display` is server-rendered text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub preview: String,
    #[serde(default)]
    pub time_display: String,
}

/// Named bucket of summaries ("Today", "Earlier", ...). Client-side only,
/// rebuilt from scratch on every history fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationGroup {
    pub name: String,
    pub conversations: Vec<ConversationSummary>,
}

/// The server returns groups as a JSON object, which carries no ordering.
/// Sort the known buckets newest-first and anything unexpected after them.
fn group_rank(name: &str) -> (usize, &str) {
    let rank = match name {
        "Today" => 0,
        "Yesterday" => 1,
        "Previous 7 Days" => 2,
        "Earlier" => 3,
        _ => 4,
    };
    (rank, name)
}

pub fn sort_groups(groups: &mut [ConversationGroup]) {
    groups.sort_by(|a, b| group_rank(&a.name).cmp(&group_rank(&b.name)));
}
