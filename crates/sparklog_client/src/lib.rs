//! crates/sparklog_client/src/lib.rs
//!
//! The client service facade over the two API routes. This is the only
//! surface a UI talks to; its guarantee is that callers never see an error
//! value and never a partially-shaped response: every field always carries
//! at least a safe default.

use std::time::Duration;

use serde_json::{json, Value};
use sparklog_core::{
    domain::{ChatResponse, DailySummary, ErrorKind, Message},
    ports::{PortError, PortResult},
    retry::with_retry,
};
use tracing::error;

const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// A thin HTTP client for the SparkLog backend.
#[derive(Clone)]
pub struct SparkLogClient {
    http: reqwest::Client,
    base_url: String,
    max_attempts: u32,
    retry_base_delay: Duration,
}

impl SparkLogClient {
    /// Creates a facade for the backend at `base_url`
    /// (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    /// Overrides the client-side retry policy.
    pub fn with_retry_policy(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_base_delay = base_delay;
        self
    }

    /// POSTs a JSON body, retrying transport failures and 5xx statuses.
    /// Non-5xx responses are returned for the caller to interpret; 4xx is
    /// never retried.
    async fn post_json(&self, path: &str, body: &Value) -> PortResult<(u16, Value)> {
        let url = format!("{}{}", self.base_url, path);
        with_retry(
            || async {
                let response = self
                    .http
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| PortError::Network(e.to_string()))?;

                let status = response.status().as_u16();
                if status >= 500 {
                    let message = response.text().await.unwrap_or_default();
                    return Err(PortError::Upstream { status, message });
                }

                let data = response
                    .json::<Value>()
                    .await
                    .map_err(|e| PortError::Parsing(e.to_string()))?;
                Ok((status, data))
            },
            self.max_attempts,
            self.retry_base_delay,
        )
        .await
    }

    /// Sends one chat turn. Structured error fields from the route pass
    /// through untouched; a client-side transport failure maps to a fixed
    /// message with the `network_client` kind. Never returns an error.
    pub async fn send_message(
        &self,
        text: &str,
        history: &[Message],
        image_base64: Option<&str>,
    ) -> ChatResponse {
        let body = json!({
            "text": text,
            "history": history,
            "image": image_base64,
        });

        match self.post_json("/api/chat", &body).await {
            Ok((_, data)) => shape_chat(data),
            Err(err) => {
                error!("chat request failed: {err}");
                network_client_chat()
            }
        }
    }

    /// Requests the end-of-day summary. The result is always a fully shaped
    /// `DailySummary`: route-reported errors keep whatever content fields
    /// the route produced, transport failures yield pure defaults, and a
    /// missing date is filled from the local clock. Never returns an error.
    pub async fn generate_daily_summary(&self, messages: &[Message]) -> DailySummary {
        let body = json!({ "messages": messages });

        match self.post_json("/api/summary", &body).await {
            Ok((_, data)) => shape_summary(data),
            Err(err) => {
                error!("summary request failed: {err}");
                let mut summary = DailySummary::fallback(local_date_string());
                summary.error = Some("客户端网络错误".to_string());
                summary.error_type = Some(ErrorKind::NetworkClient);
                summary
            }
        }
    }
}

/// Today's date from the local clock, same rendering the server uses.
fn local_date_string() -> String {
    use chrono::Datelike;
    let today = chrono::Local::now().date_naive();
    format!("{}年{}月{}日", today.year(), today.month(), today.day())
}

/// Interprets a chat route body; an unreadable body counts as a client-side
/// failure.
fn shape_chat(data: Value) -> ChatResponse {
    match serde_json::from_value::<ChatResponse>(data) {
        Ok(response) => response,
        Err(err) => {
            error!("chat response body did not match the wire shape: {err}");
            network_client_chat()
        }
    }
}

fn network_client_chat() -> ChatResponse {
    ChatResponse {
        text: ErrorKind::NetworkClient.user_message().to_string(),
        sources: Vec::new(),
        error: Some(ErrorKind::NetworkClient),
        diagnostic: None,
    }
}

/// Interprets a summary route body. Present fields, including the error
/// metadata, are preserved as-is; absent ones take their defaults.
fn shape_summary(data: Value) -> DailySummary {
    let mut summary = match serde_json::from_value::<DailySummary>(data) {
        Ok(summary) => summary,
        Err(err) => {
            error!("summary response body did not match the wire shape: {err}");
            let mut fallback = DailySummary::fallback(String::new());
            fallback.error = Some("客户端网络错误".to_string());
            fallback.error_type = Some(ErrorKind::NetworkClient);
            fallback
        }
    };
    if summary.date.is_empty() {
        summary.date = local_date_string();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparklog_core::domain::Role;

    #[test]
    fn route_error_body_keeps_content_and_error_metadata() {
        let body = json!({
            "highlight": ["修好了 CI"],
            "actionItems": ["写周报"],
            "inspirations": [],
            "stats": [{ "label": "今日消费", "value": "128元" }],
            "moodEmoji": "🌟",
            "moodColor": "#FF5733",
            "date": "2024年1月9日",
            "rawLog": [],
            "error": "AI 服务暂时不可用，请稍后重试。",
            "errorType": "service"
        });
        let summary = shape_summary(body);
        assert_eq!(summary.highlight, vec!["修好了 CI"]);
        assert_eq!(summary.stats.len(), 1);
        assert_eq!(summary.mood_emoji, "🌟");
        assert_eq!(summary.date, "2024年1月9日");
        assert_eq!(summary.error_type, Some(ErrorKind::Service));
        assert!(summary.error.is_some());
    }

    #[test]
    fn partial_body_is_filled_with_defaults() {
        let summary = shape_summary(json!({ "highlight": ["只有这一项"] }));
        assert_eq!(summary.highlight, vec!["只有这一项"]);
        assert!(summary.stats.is_empty());
        assert_eq!(summary.mood_emoji, "😐");
        assert_eq!(summary.mood_color, "#808080");
        assert!(!summary.date.is_empty());
    }

    #[test]
    fn chat_error_body_passes_through() {
        let response = shape_chat(json!({
            "text": "AI 服务认证失败，请检查服务器配置。",
            "sources": [],
            "error": "authentication"
        }));
        assert_eq!(response.error, Some(ErrorKind::Authentication));
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn summary_transport_failure_yields_default_shape() {
        // Nothing listens on port 9; the connection is refused immediately.
        let client = SparkLogClient::new("http://127.0.0.1:9")
            .with_retry_policy(1, Duration::from_millis(1));
        let messages = vec![Message {
            role: Role::User,
            text: "今天花了128元吃饭".to_string(),
            image_base64: None,
        }];
        let summary = client.generate_daily_summary(&messages).await;
        assert_eq!(summary.mood_emoji, "😐");
        assert_eq!(summary.mood_color, "#808080");
        assert!(summary.stats.is_empty());
        assert_eq!(summary.error_type, Some(ErrorKind::NetworkClient));
        assert!(!summary.date.is_empty());
    }

    #[tokio::test]
    async fn chat_transport_failure_yields_fixed_message() {
        let client = SparkLogClient::new("http://127.0.0.1:9")
            .with_retry_policy(1, Duration::from_millis(1));
        let response = client.send_message("你好", &[], None).await;
        assert_eq!(response.error, Some(ErrorKind::NetworkClient));
        assert_eq!(
            response.text,
            "网络连接失败或请求处理异常，请检查网络连接后重试。"
        );
    }
}
