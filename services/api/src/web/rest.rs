//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sparklog_core::{
    domain::{self, ChatResponse, DailySummary, ErrorKind, Message, SummaryContent},
    ports::{PortError, PortResult},
    retry::with_retry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

/// Provider calls are retried this many times per request.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_handler,
        summary_handler,
    ),
    components(
        schemas(
            ChatRequest,
            SummaryRequest,
            ChatResponse,
            DailySummary,
            Message,
            sparklog_core::domain::Role,
            sparklog_core::domain::GroundingSource,
            sparklog_core::domain::StatEntry,
            ErrorKind,
        )
    ),
    tags(
        (name = "SparkLog API", description = "API endpoints for the conversational journaling assistant.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request Payload Structs
//=========================================================================================

/// The request payload of the chat route.
///
/// `messages` and `history` are two names for the same thing used by
/// different front-end versions; `messages` wins when non-empty.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Optional inline JPEG payload, base64 encoded.
    #[serde(default)]
    pub image: Option<String>,
}

/// The request payload of the summary route: one day's full history.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Splits a chat request into the context history and the latest user turn.
///
/// When `text` is present it is the latest turn and the whole list is
/// context. Otherwise the last list entry is popped and sent once as the
/// latest turn (the history must not repeat it).
fn resolve_turn(req: ChatRequest) -> (Vec<Message>, String, Option<String>) {
    let mut list = if !req.messages.is_empty() {
        req.messages
    } else {
        req.history
    };

    match req.text {
        Some(text) if !text.is_empty() => (list, text, req.image),
        _ => match list.pop() {
            Some(last) => {
                let image = req.image.or(last.image_base64);
                (list, last.text, image)
            }
            None => (list, String::new(), req.image),
        },
    }
}

/// Today's calendar date as rendered in a summary, e.g. `2024年1月9日`.
/// Always computed server-side; a model-produced date is never trusted.
fn today_date_string() -> String {
    use chrono::Datelike;
    let today = chrono::Local::now().date_naive();
    format!("{}年{}月{}日", today.year(), today.month(), today.day())
}

/// Strips code fences from the raw model output and parses it into the
/// summary content shape.
fn parse_summary(raw: &str) -> PortResult<SummaryContent> {
    let cleaned = domain::strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| PortError::Parsing(e.to_string()))
}

/// Raw error text is only exposed outside production.
fn diagnostic_for(state: &AppState, err: &PortError) -> Option<String> {
    (!state.config.production).then(|| err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate one chat reply for the latest user message.
///
/// The caller owns the conversation history and passes it on every call;
/// the backend holds no session state. Transient provider failures are
/// retried with exponential backoff before the request fails.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Generated reply with any grounding citations", body = ChatResponse),
        (status = 500, description = "Missing credentials or provider failure", body = ChatResponse)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let (history, latest, image) = resolve_turn(req);

    // Development mode answers without touching the provider so the route
    // can be exercised with no credentials at hand.
    if state.config.dev_mode {
        return (
            StatusCode::OK,
            Json(ChatResponse {
                text: format!(
                    "这是模拟响应：你好！我收到了你的消息 \"{}\"。AI 服务连接当前暂时不可用。",
                    latest
                ),
                sources: Vec::new(),
                error: None,
                diagnostic: None,
            }),
        );
    }

    let result = with_retry(
        || state.chat.send_message(&history, &latest, image.as_deref()),
        MAX_ATTEMPTS,
        RETRY_BASE_DELAY,
    )
    .await;

    match result {
        Ok(reply) => (
            StatusCode::OK,
            Json(ChatResponse {
                text: reply.text,
                sources: reply.sources,
                error: None,
                diagnostic: None,
            }),
        ),
        Err(err) => {
            error!("chat generation failed: {err}");
            let kind = ErrorKind::of(&err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    text: kind.user_message().to_string(),
                    sources: Vec::new(),
                    error: Some(kind),
                    diagnostic: diagnostic_for(&state, &err),
                }),
            )
        }
    }
}

/// Generate the structured end-of-day summary for one day's history.
///
/// The response is a fully populated `DailySummary` in every case. On
/// failure all content fields carry safe defaults next to the error
/// metadata, so consumers never branch on a missing field.
#[utoipa::path(
    post,
    path = "/api/summary",
    request_body = SummaryRequest,
    responses(
        (status = 200, description = "Structured daily summary", body = DailySummary),
        (status = 500, description = "Default-valued summary with error metadata", body = DailySummary)
    )
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummaryRequest>,
) -> (StatusCode, Json<DailySummary>) {
    let transcript = domain::transcript(&req.messages);
    let date = today_date_string();

    let result = with_retry(
        || state.summary.generate_summary(&transcript),
        MAX_ATTEMPTS,
        RETRY_BASE_DELAY,
    )
    .await
    .and_then(|raw| parse_summary(&raw));

    match result {
        Ok(content) => (
            StatusCode::OK,
            Json(DailySummary::from_content(content, date)),
        ),
        Err(err) => {
            error!("summary generation failed: {err}");
            let kind = ErrorKind::of(&err);
            let mut body = DailySummary::fallback(date);
            body.error = Some(kind.user_message().to_string());
            body.error_type = Some(kind);
            body.diagnostic = diagnostic_for(&state, &err);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use async_trait::async_trait;
    use sparklog_core::domain::{ChatReply, Role};
    use sparklog_core::ports::{ChatService, SummaryService};

    fn msg(role: Role, text: &str) -> Message {
        Message {
            role,
            text: text.to_string(),
            image_base64: None,
        }
    }

    fn test_config(dev_mode: bool) -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            log_level: tracing::Level::INFO,
            provider: Provider::Gemini,
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            volcengine_api_key: None,
            volcengine_api_secret: None,
            volcengine_api_endpoint: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
            volcengine_model: "doubao-seed-1-6-flash".to_string(),
            dev_mode,
            production: false,
        }
    }

    struct FailingChat(PortError);

    #[async_trait]
    impl ChatService for FailingChat {
        async fn send_message(
            &self,
            _history: &[Message],
            _latest: &str,
            _image_base64: Option<&str>,
        ) -> PortResult<ChatReply> {
            Err(match &self.0 {
                PortError::MissingCredential(v) => PortError::MissingCredential(v.clone()),
                other => PortError::Unexpected(other.to_string()),
            })
        }
    }

    struct FixedSummary(&'static str);

    #[async_trait]
    impl SummaryService for FixedSummary {
        async fn generate_summary(&self, _transcript: &str) -> PortResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct NoopSummary;

    #[async_trait]
    impl SummaryService for NoopSummary {
        async fn generate_summary(&self, _transcript: &str) -> PortResult<String> {
            Err(PortError::Unexpected("not wired".to_string()))
        }
    }

    fn state_with(
        config: Config,
        chat: Arc<dyn ChatService>,
        summary: Arc<dyn SummaryService>,
    ) -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(config),
            chat,
            summary,
        })
    }

    #[test]
    fn messages_take_precedence_and_latest_is_popped() {
        let req = ChatRequest {
            text: None,
            history: vec![msg(Role::User, "ignored")],
            messages: vec![msg(Role::User, "早上好"), msg(Role::User, "今天花了128元吃饭")],
            image: None,
        };
        let (history, latest, image) = resolve_turn(req);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "早上好");
        assert_eq!(latest, "今天花了128元吃饭");
        assert!(image.is_none());
    }

    #[test]
    fn explicit_text_keeps_the_full_history() {
        let req = ChatRequest {
            text: Some("新消息".to_string()),
            history: vec![msg(Role::User, "旧消息"), msg(Role::Model, "回复")],
            messages: Vec::new(),
            image: Some("aGVsbG8=".to_string()),
        };
        let (history, latest, image) = resolve_turn(req);
        assert_eq!(history.len(), 2);
        assert_eq!(latest, "新消息");
        assert_eq!(image.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn date_string_uses_chinese_calendar_format() {
        let date = today_date_string();
        assert!(date.contains('年') && date.contains('月') && date.ends_with('日'));
    }

    #[test]
    fn summary_without_stats_parses_to_empty_array() {
        let raw = r##"{"highlight": ["看了一场电影"], "actionItems": [], "inspirations": [],
                      "moodEmoji": "🌟", "moodColor": "#FF5733"}"##;
        let content = parse_summary(raw).unwrap();
        assert!(content.stats.is_empty());
        assert_eq!(content.mood_emoji, "🌟");
    }

    #[test]
    fn fenced_summary_output_still_parses() {
        let raw = "```json\n{\"highlight\": [\"读书\"]}\n```";
        let content = parse_summary(raw).unwrap();
        assert_eq!(content.highlight, vec!["读书"]);
    }

    #[test]
    fn garbage_summary_output_is_a_parsing_error() {
        let err = parse_summary("总结失败，抱歉。").unwrap_err();
        assert_eq!(ErrorKind::of(&err), ErrorKind::Parsing);
    }

    #[tokio::test]
    async fn missing_credential_yields_immediate_500() {
        let state = state_with(
            test_config(false),
            Arc::new(FailingChat(PortError::MissingCredential(
                "GEMINI_API_KEY".to_string(),
            ))),
            Arc::new(NoopSummary),
        );
        let req = ChatRequest {
            text: Some("你好".to_string()),
            history: Vec::new(),
            messages: Vec::new(),
            image: None,
        };
        let (status, Json(body)) = chat_handler(State(state), Json(req)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, Some(ErrorKind::Authentication));
        assert!(body.sources.is_empty());
    }

    #[tokio::test]
    async fn dev_mode_replies_without_a_provider() {
        let state = state_with(
            test_config(true),
            Arc::new(FailingChat(PortError::MissingCredential(
                "GEMINI_API_KEY".to_string(),
            ))),
            Arc::new(NoopSummary),
        );
        let req = ChatRequest {
            text: Some("测试".to_string()),
            history: Vec::new(),
            messages: Vec::new(),
            image: None,
        };
        let (status, Json(body)) = chat_handler(State(state), Json(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.text.contains("测试"));
        assert!(body.error.is_none());
    }

    #[tokio::test]
    async fn summary_response_is_fully_shaped_with_server_date() {
        struct NoopChat;
        #[async_trait]
        impl ChatService for NoopChat {
            async fn send_message(
                &self,
                _history: &[Message],
                _latest: &str,
                _image_base64: Option<&str>,
            ) -> PortResult<ChatReply> {
                Err(PortError::Unexpected("not wired".to_string()))
            }
        }

        let state = state_with(
            test_config(false),
            Arc::new(NoopChat),
            Arc::new(FixedSummary(
                r#"{"highlight": ["高光"], "date": "1999年1月1日"}"#,
            )),
        );
        let req = SummaryRequest {
            messages: vec![msg(Role::User, "今天花了128元吃饭")],
        };
        let (status, Json(body)) = summary_handler(State(state), Json(req)).await;
        assert_eq!(status, StatusCode::OK);
        // The model-supplied date is ignored in favor of the server clock.
        assert_ne!(body.date, "1999年1月1日");
        assert!(body.date.contains('年'));
        assert_eq!(body.highlight, vec!["高光"]);
        assert!(body.stats.is_empty());
        assert!(body.raw_log.is_empty());
    }
}
