//! crates/sparklog_core/src/domain.rs
//!
//! Defines the core data structures for the journaling assistant.
//! These are also the wire shapes of the two API routes, so they carry
//! serde derives; the backend itself is stateless and every struct here
//! is a plain value owned by the caller.

use serde::{Deserialize, Serialize};

/// The author of a single conversation message.
///
/// `System` entries may appear in caller-supplied history but are never
/// forwarded to an LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

/// One message of the conversation history, passed by value on every
/// request. The history is append-only and owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    /// The message text. Some front ends send this as `content`.
    #[serde(alias = "content")]
    pub text: String,
    /// Optional inline JPEG payload, base64 encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// A citation the provider attaches when it used its search tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// What a chat provider adapter returns for one turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// A single quantifiable fact the model aggregated from the transcript,
/// e.g. `{ label: "今日消费", value: "128元" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatEntry {
    pub label: String,
    pub value: String,
}

fn default_mood_emoji() -> String {
    "😐".to_string()
}

fn default_mood_color() -> String {
    "#808080".to_string()
}

/// The model-produced part of a daily summary.
///
/// Every field has a default so a partially filled provider response still
/// deserializes into a fully shaped value. `stats` is an empty array, never
/// absent, when the transcript contains no quantifiable facts. `mood_color`
/// is only prompted to be a hex code; malformed values are tolerated and
/// passed through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryContent {
    pub highlight: Vec<String>,
    pub action_items: Vec<String>,
    pub inspirations: Vec<String>,
    pub stats: Vec<StatEntry>,
    pub mood_emoji: String,
    pub mood_color: String,
}

impl Default for SummaryContent {
    fn default() -> Self {
        Self {
            highlight: Vec::new(),
            action_items: Vec::new(),
            inspirations: Vec::new(),
            stats: Vec::new(),
            mood_emoji: default_mood_emoji(),
            mood_color: default_mood_color(),
        }
    }
}

/// The complete daily summary returned by `POST /api/summary`.
///
/// The `date` is always stamped from the server clock; a date the model
/// produced is never trusted. Consumers can rely on every field being
/// present even when `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    #[serde(default)]
    pub highlight: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub inspirations: Vec<String>,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
    #[serde(default = "default_mood_emoji")]
    pub mood_emoji: String,
    #[serde(default = "default_mood_color")]
    pub mood_color: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub raw_log: Vec<serde_json::Value>,
    /// Localized error message, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    /// Raw error text, exposed outside production only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl DailySummary {
    /// Assembles a summary from model content plus the server-side date.
    pub fn from_content(content: SummaryContent, date: String) -> Self {
        Self {
            highlight: content.highlight,
            action_items: content.action_items,
            inspirations: content.inspirations,
            stats: content.stats,
            mood_emoji: content.mood_emoji,
            mood_color: content.mood_color,
            date,
            raw_log: Vec::new(),
            error: None,
            error_type: None,
            diagnostic: None,
        }
    }

    /// A fully shaped default-valued summary, used whenever generation
    /// fails so consumers never branch on a missing field.
    pub fn fallback(date: String) -> Self {
        Self::from_content(SummaryContent::default(), date)
    }
}

/// The response of `POST /api/chat` and of the client facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
    /// Machine-readable error kind, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "errorType")]
    pub error: Option<ErrorKind>,
    /// Raw error text, exposed outside production only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Coarse error classification shown to the user and serialized on the
/// wire (`"authentication"`, `"network_client"`, ...). Produced from a
/// `PortError` by `ErrorKind::of` in the ports module; `NetworkClient` is
/// only ever set by the client facade for its own transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Permission,
    Network,
    Quota,
    Parsing,
    Service,
    NetworkClient,
}

impl ErrorKind {
    /// The fixed localized message rendered for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "AI 服务认证失败，请检查服务器配置。",
            ErrorKind::Permission => "AI 服务拒绝了本次请求，请稍后再试。",
            ErrorKind::Network => "网络连接不稳定，请稍后重试。",
            ErrorKind::Quota => "AI 服务额度已用尽，请稍后再试。",
            ErrorKind::Parsing => "AI 返回的内容无法解析，请重试一次。",
            ErrorKind::Service => "AI 服务暂时不可用，请稍后重试。",
            ErrorKind::NetworkClient => "网络连接失败或请求处理异常，请检查网络连接后重试。",
        }
    }
}

/// The display label used for a role in the daily transcript.
fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "用户",
        _ => "SparkLog",
    }
}

/// Renders one day's history as a plain-text transcript, one
/// `"{role label}: {text}"` line per message.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes markdown code fences from a model response.
///
/// Providers usually return pure JSON when asked for it, but fenced
/// ```` ```json ```` blocks still show up occasionally.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, text: &str) -> Message {
        Message {
            role,
            text: text.to_string(),
            image_base64: None,
        }
    }

    #[test]
    fn transcript_labels_and_joins_lines() {
        let history = vec![
            msg(Role::User, "今天跑了五公里"),
            msg(Role::Model, "太棒了！"),
        ];
        assert_eq!(transcript(&history), "用户: 今天跑了五公里\nSparkLog: 太棒了！");
    }

    #[test]
    fn summary_content_defaults_fill_missing_fields() {
        let content: SummaryContent =
            serde_json::from_str(r#"{"highlight": ["读完了一本书"]}"#).unwrap();
        assert_eq!(content.highlight, vec!["读完了一本书"]);
        assert!(content.stats.is_empty());
        assert_eq!(content.mood_emoji, "😐");
        assert_eq!(content.mood_color, "#808080");
    }

    #[test]
    fn message_accepts_content_as_text_alias() {
        let m: Message = serde_json::from_str(r#"{"role": "user", "content": "hi"}"#).unwrap();
        assert_eq!(m.text, "hi");
    }

    #[test]
    fn malformed_mood_color_is_passed_through() {
        let content: SummaryContent =
            serde_json::from_str(r#"{"moodColor": "not-a-hex"}"#).unwrap();
        assert_eq!(content.mood_color, "not-a-hex");
    }

    #[test]
    fn fenced_json_is_stripped_before_parsing() {
        let raw = "```json\n{\"highlight\": []}\n```";
        let cleaned = strip_code_fences(raw);
        assert_eq!(cleaned, "{\"highlight\": []}");
        assert!(serde_json::from_str::<SummaryContent>(&cleaned).is_ok());
    }

    #[test]
    fn daily_summary_serializes_camel_case_without_error_fields() {
        let summary = DailySummary::fallback("2024年1月1日".to_string());
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["moodEmoji"], "😐");
        assert_eq!(value["stats"], serde_json::json!([]));
        assert_eq!(value["rawLog"], serde_json::json!([]));
        assert!(value.get("errorType").is_none());
    }
}
