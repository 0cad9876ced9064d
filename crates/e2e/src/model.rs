//! Model service protocol and HTTP client
//!
//! The conversation is a list of [`Message`]s whose content is a list of
//! typed blocks. Assistant turns carry `text` and `tool_use` blocks; the
//! runner answers tool calls with a user turn of `tool_result` blocks
//! correlated by `tool_use_id`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use aiqa_common::AiqaConfig;

use crate::error::{E2eError, E2eResult};

/// API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Beta flag enabling the computer tool
pub const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";

/// Tool type of the computer tool
pub const COMPUTER_TOOL_TYPE: &str = "computer_20241022";

/// Name the model uses when calling the computer tool
pub const COMPUTER_TOOL_NAME: &str = "computer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultContent>,
    },
}

/// Payload inside a `tool_result` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Declaration of the computer tool sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub display_width_px: u32,
    pub display_height_px: u32,
    pub display_number: u32,
}

impl ComputerTool {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            kind: COMPUTER_TOOL_TYPE.to_string(),
            name: COMPUTER_TOOL_NAME.to_string(),
            display_width_px: width,
            display_height_px: height,
            display_number: 1,
        }
    }
}

/// Request body; borrows the transcript so it is not copied every turn
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub tools: &'a [ComputerTool],
    pub messages: &'a [Message],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Abstraction over the model service so the conversation engine can be
/// driven by a scripted model in tests.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn create_message(&self, request: &MessageRequest<'_>) -> E2eResult<MessageResponse>;
}

/// Messages API client over HTTPS
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> E2eResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &AiqaConfig) -> E2eResult<Self> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.timeout_ms.map(Duration::from_millis),
        )
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn create_message(&self, request: &MessageRequest<'_>) -> E2eResult<MessageResponse> {
        debug!(
            "Sending request to model={} with {} message(s)",
            request.model,
            request.messages.len()
        );

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", COMPUTER_USE_BETA)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(E2eError::ModelStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessageResponse = serde_json::from_str(&body)
            .map_err(|e| E2eError::Model(format!("malformed response: {}", e)))?;

        if let Some(usage) = parsed.usage {
            debug!(
                "Model usage: input_tokens={} output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn tools() -> Vec<ComputerTool> {
        vec![ComputerTool::new(1280, 800)]
    }

    fn messages() -> Vec<Message> {
        vec![Message::user_text("click button")]
    }

    fn request<'a>(tools: &'a [ComputerTool], messages: &'a [Message]) -> MessageRequest<'a> {
        MessageRequest {
            model: "test-model",
            max_tokens: 64,
            system: "be brief",
            tools,
            messages,
        }
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: vec![ToolResultContent::Image {
                source: ImageSource::base64("image/jpeg", "AAAA"),
            }],
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": [{
                    "type": "image",
                    "source": {"type": "base64", "media_type": "image/jpeg", "data": "AAAA"}
                }]
            })
        );
    }

    #[test]
    fn test_computer_tool_declaration() {
        let value = serde_json::to_value(ComputerTool::new(1024, 768)).unwrap();
        assert_eq!(value["type"], "computer_20241022");
        assert_eq!(value["name"], "computer");
        assert_eq!(value["display_width_px"], 1024);
        assert_eq!(value["display_height_px"], 768);
        assert_eq!(value["display_number"], 1);
    }

    #[test]
    fn test_parse_mixed_response() {
        let response: MessageResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "computer", "input": {"action": "screenshot"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        assert_eq!(response.content.len(), 2);
        assert!(matches!(&response.content[1], ContentBlock::ToolUse { id, .. } if id == "toolu_1"));
    }

    #[tokio::test]
    async fn test_client_sends_headers_and_parses_reply() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "sk-test")
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("anthropic-beta", COMPUTER_USE_BETA);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "id": "msg_1",
                        "content": [{"type": "text", "text": "{\"test_passed\": true, \"motivation\": \"ok\"}"}],
                        "stop_reason": "end_turn"
                    }));
            })
            .await;

        let client = AnthropicClient::new(server.base_url(), "sk-test", None).unwrap();
        let response = client.create_message(&request(&tools(), &messages())).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
        assert!(matches!(&response.content[0], ContentBlock::Text { text } if text.contains("test_passed")));
    }

    #[tokio::test]
    async fn test_client_surfaces_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429).body("rate limited");
            })
            .await;

        let client = AnthropicClient::new(server.base_url(), "sk-test", None).unwrap();
        let err = client.create_message(&request(&tools(), &messages())).await.unwrap_err();
        assert!(matches!(err, E2eError::ModelStatus { status: 429, ref body } if body == "rate limited"));
    }

    #[tokio::test]
    async fn test_client_rejects_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).body("not json");
            })
            .await;

        let client = AnthropicClient::new(server.base_url(), "sk-test", None).unwrap();
        let err = client.create_message(&request(&tools(), &messages())).await.unwrap_err();
        assert!(matches!(err, E2eError::Model(_)));
    }
}
