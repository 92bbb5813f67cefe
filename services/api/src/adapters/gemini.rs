//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Google Gemini REST API
//! (`generateContent`, v1beta). It implements both the `ChatService` and
//! `SummaryService` ports from the `core` crate.

pub(crate) const SYSTEM_INSTRUCTION: &str = r#"
角色定义：
你是 SparkLog（星火日志），一个碎片化日记助手。你的人设是好奇、充满活力且富有洞察力的“数字死党”。

语言要求：
**全程使用中文**。
**极致简洁**：除非用户要求深究，否则回复控制在 **40字以内**。不要废话，直击重点。

🔴 **关于链接处理的核心规则 (最高优先级)**：
1. **必须调用搜索**：收到 URL 必须使用 Google Search。
2. **严禁瞎猜**：如果 Search 结果只显示“验证码”、“登录”、“首页”或非常泛泛的平台介绍，**绝对不要**根据 URL 里的单词去编造内容。
3. **无法读取时的处理**：
   - 如果你无法从搜索摘要中获取该具体文章/视频的详细内容，**直接承认**。
   - 回复模板：“这个链接我看不到具体内容🙈。是关于什么的？给我个太长不看版（TL;DR）？”
   - **不要**试图解释为什么看不了，直接问用户内容。

交互流程：
1. 碎片记录模式（实时对话）
   - **链接**：尝试搜索 -> 有内容则一句话概括+提问；无内容则直接问用户“讲了啥？”。
   - **文本**：秒回。给予简短的情绪价值（“太棒了！”“抱抱🫂”），或者标记 Todo。
   - **图片**：一句话神吐槽或夸奖。

2. “每日日结”模式
   - 不需要确认，直接生成总结。
"#;

pub(crate) const SUMMARY_PROMPT_TEMPLATE: &str = r##"
🔴 系统指令：立即执行【今日日结】任务。

以下是今天的完整对话记录：
====================
{transcript}
====================

请根据上述对话内容，生成一份结构化的日记总结。

要求：
1. 语言必须是**中文**。
2. 严格按照下方的 JSON 格式返回。
3. **stats (数据统计)**：请仔细分析对话，如果有提到具体的花费（金额）、数量（如见了3个客户、跑了5公里、读了2本书），请自动汇总计算。如果没有数字，此项必须为空数组 []。
4. **highlight (今日高光)**：3-5 个具体的点，简短有力，必须基于对话内容，不要编造。
5. **moodEmoji**：选择一个最能代表今天心情的 Emoji。
6. **moodColor**：选择一个代表今天心情的颜色 Hex 代码 (必须是有效的颜色代码，例如 #FF5733)。

JSON 结构定义：
{
  "highlight": ["高光时刻1", "高光时刻2"],
  "actionItems": ["待办1", "计划2"],
  "inspirations": ["链接标题", "灵感碎片"],
  "stats": [
      { "label": "今日消费", "value": "128元" },
      { "label": "完成任务", "value": "3项" }
  ],
  "moodEmoji": "🌟",
  "moodColor": "#HEXCODE"
}
"##;

use async_trait::async_trait;
use serde_json::{json, Value};
use sparklog_core::{
    domain::{ChatReply, GroundingSource, Message, Role},
    ports::{ChatService, PortError, PortResult, SummaryService},
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the chat and summary ports against the
/// Gemini `generateContent` REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`. The key stays optional so that a
    /// misconfigured deployment fails per request, before any provider call.
    pub fn new(http: reqwest::Client, api_key: Option<String>, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    fn api_key(&self) -> PortResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| PortError::MissingCredential("GEMINI_API_KEY".to_string()))
    }

    /// Maps prior conversation turns to Gemini `contents` entries.
    /// System-role entries are filtered out.
    fn build_history(history: &[Message]) -> Vec<Value> {
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Model => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.text }] })
            })
            .collect()
    }

    /// Builds the `parts` of the latest user turn, inlining the image
    /// payload when one is attached.
    fn build_latest_parts(latest: &str, image_base64: Option<&str>) -> Vec<Value> {
        match image_base64 {
            Some(data) => {
                let caption = if latest.is_empty() { "看看这张图！" } else { latest };
                vec![
                    json!({ "inline_data": { "mime_type": "image/jpeg", "data": data } }),
                    json!({ "text": caption }),
                ]
            }
            None => vec![json!({ "text": latest })],
        }
    }

    async fn generate(&self, body: Value) -> PortResult<Value> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}:generateContent", API_BASE, self.model);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PortError::Parsing(e.to_string()))
    }

    /// Joins the text parts of the first candidate.
    fn extract_text(payload: &Value) -> String {
        payload
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|cand| cand.pointer("/content/parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    /// Collects grounding citations surfaced by the search tool, if any.
    fn extract_sources(payload: &Value) -> Vec<GroundingSource> {
        payload
            .pointer("/candidates/0/groundingMetadata/groundingChunks")
            .and_then(|c| c.as_array())
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| {
                        let uri = chunk.pointer("/web/uri")?.as_str()?;
                        let title = chunk.pointer("/web/title")?.as_str()?;
                        Some(GroundingSource {
                            uri: uri.to_string(),
                            title: title.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The constrained JSON output schema of the daily summary call.
    fn summary_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "highlight": { "type": "ARRAY", "items": { "type": "STRING" } },
                "actionItems": { "type": "ARRAY", "items": { "type": "STRING" } },
                "inspirations": { "type": "ARRAY", "items": { "type": "STRING" } },
                "stats": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "label": { "type": "STRING" },
                            "value": { "type": "STRING" }
                        }
                    }
                },
                "moodEmoji": { "type": "STRING" },
                "moodColor": { "type": "STRING" }
            },
            "required": ["highlight", "actionItems", "inspirations", "moodEmoji", "moodColor"]
        })
    }
}

//=========================================================================================
// Service Trait Implementations
//=========================================================================================

#[async_trait]
impl ChatService for GeminiAdapter {
    /// Sends one chat turn with the prior history as context, with the
    /// search tool enabled so link messages can be grounded.
    async fn send_message(
        &self,
        history: &[Message],
        latest: &str,
        image_base64: Option<&str>,
    ) -> PortResult<ChatReply> {
        let mut contents = Self::build_history(history);
        contents.push(json!({
            "role": "user",
            "parts": Self::build_latest_parts(latest, image_base64),
        }));

        let body = json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": contents,
            "tools": [{ "google_search": {} }],
        });

        let payload = self.generate(body).await?;
        Ok(ChatReply {
            text: Self::extract_text(&payload),
            sources: Self::extract_sources(&payload),
        })
    }
}

#[async_trait]
impl SummaryService for GeminiAdapter {
    /// Runs the daily summary generation constrained to the summary JSON
    /// schema and returns the raw model text.
    async fn generate_summary(&self, transcript: &str) -> PortResult<String> {
        let prompt = SUMMARY_PROMPT_TEMPLATE.replace("{transcript}", transcript);

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::summary_schema(),
            },
        });

        let payload = self.generate(body).await?;
        Ok(Self::extract_text(&payload))
    }
}
