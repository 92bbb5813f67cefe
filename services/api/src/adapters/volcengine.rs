//! services/api/src/adapters/volcengine.rs
//!
//! This module contains the adapter for a VolcEngine-hosted model behind
//! the Ark OpenAI-compatible chat-completion endpoint. It implements the
//! `ChatService` and `SummaryService` ports from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageUrlArgs, ReasoningEffort, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use sparklog_core::{
    domain::{ChatReply, Message, Role},
    ports::{ChatService, PortError, PortResult, SummaryService},
};

use super::gemini::{SUMMARY_PROMPT_TEMPLATE, SYSTEM_INSTRUCTION};

const MAX_COMPLETION_TOKENS: u32 = 2048;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the chat and summary ports using a
/// VolcEngine-hosted model via its OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct VolcEngineAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl VolcEngineAdapter {
    /// Creates a new `VolcEngineAdapter`. Without a key no client is built
    /// and every call reports the missing credential before any request.
    pub fn new(api_key: Option<String>, endpoint: String, model: String) -> Self {
        let client = api_key.map(|key| {
            Client::with_config(
                OpenAIConfig::new()
                    .with_api_base(endpoint)
                    .with_api_key(key),
            )
        });
        Self { client, model }
    }

    fn client(&self) -> PortResult<&Client<OpenAIConfig>> {
        self.client
            .as_ref()
            .ok_or_else(|| PortError::MissingCredential("VOLCENGINE_API_KEY".to_string()))
    }

    /// Maps prior conversation turns to OpenAI-style request messages.
    /// System-role entries are filtered out; the single system instruction
    /// is supplied by the adapter itself.
    fn build_history(history: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                Ok(match m.role {
                    Role::Model => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.text.clone())
                        .build()?
                        .into(),
                    _ => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.text.clone())
                        .build()?
                        .into(),
                })
            })
            .collect()
    }

    /// Builds the latest user turn, attaching the image as a data URL
    /// content part when one is present.
    fn build_latest(
        latest: &str,
        image_base64: Option<&str>,
    ) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        let message = match image_base64 {
            Some(data) => {
                let caption = if latest.is_empty() { "看看这张图！" } else { latest };
                let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(
                            ImageUrlArgs::default()
                                .url(format!("data:image/jpeg;base64,{}", data))
                                .build()?,
                        )
                        .build()?
                        .into(),
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(caption)
                        .build()?
                        .into(),
                ];
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(latest)
                .build()?,
        };
        Ok(message.into())
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        json_output: bool,
    ) -> PortResult<String> {
        let client = self.client()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(MAX_COMPLETION_TOKENS)
            .reasoning_effort(ReasoningEffort::Low);
        if json_output {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| map_openai_error(e))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "VolcEngine response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "VolcEngine returned no choices in its response.".to_string(),
            ))
        }
    }
}

/// Keeps the upstream status visible where the SDK reports one, so the
/// transience and classification rules can act on it.
fn map_openai_error(err: OpenAIError) -> PortError {
    match err {
        OpenAIError::Reqwest(e) => PortError::Network(e.to_string()),
        OpenAIError::JSONDeserialize(e, _) => PortError::Parsing(e.to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// Service Trait Implementations
//=========================================================================================

#[async_trait]
impl ChatService for VolcEngineAdapter {
    /// Sends one chat turn with the prior history as context. The Ark
    /// endpoint exposes no search tool, so replies carry no sources.
    async fn send_message(
        &self,
        history: &[Message],
        latest: &str,
        image_base64: Option<&str>,
    ) -> PortResult<ChatReply> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTION)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()];
        messages.extend(
            Self::build_history(history).map_err(|e| PortError::Unexpected(e.to_string()))?,
        );
        messages.push(
            Self::build_latest(latest, image_base64)
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        );

        let text = self.complete(messages, false).await?;
        Ok(ChatReply {
            text,
            sources: Vec::new(),
        })
    }
}

#[async_trait]
impl SummaryService for VolcEngineAdapter {
    /// Runs the daily summary generation in JSON mode and returns the raw
    /// model text.
    async fn generate_summary(&self, transcript: &str) -> PortResult<String> {
        let prompt = SUMMARY_PROMPT_TEMPLATE.replace("{transcript}", transcript);
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()];
        self.complete(messages, true).await
    }
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
    fn system_messages_are_excluded_from_history() {
        let history = vec![
            msg(Role::System, "you are a journaling bot"),
            msg(Role::User, "你好"),
            msg(Role::Model, "嗨！"),
        ];
        let messages = VolcEngineAdapter::build_history(&history).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            messages[0],
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            messages[1],
            ChatCompletionRequestMessage::Assistant(_)
        ));
    }

    #[test]
    fn missing_key_fails_before_any_network_call() {
        let adapter = VolcEngineAdapter::new(
            None,
            "https://ark.cn-beijing.volces.com/api/v3".to_string(),
            "doubao-seed-1-6-flash".to_string(),
        );
        assert!(matches!(
            adapter.client(),
            Err(PortError::MissingCredential(var)) if var == "VOLCENGINE_API_KEY"
        ));
    }
}
