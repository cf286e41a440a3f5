//! Minimal client for the LLM messages API, with tool use.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::http::{check_status, endpoint, parse_base_url, read_json};

const SERVICE: &str = "LLM API";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not use (thinking, images, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    /// Tools stay declared but the model must answer in text.
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessageResponse {
    /// All text blocks joined by newlines, trimmed.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    #[must_use]
    pub fn wants_tools(&self) -> bool {
        self.stop_reason.as_deref() == Some("tool_use")
    }
}

pub struct LlmClient {
    http: Client,
    api_key: Option<String>,
    base_url: Url,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidUrl`] if `base_url` is not a valid URL.
    pub fn new(http: Client, api_key: Option<String>, base_url: &str) -> Result<Self, ResearchError> {
        Ok(Self {
            http,
            api_key,
            base_url: parse_base_url(base_url)?,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one messages request.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::MissingConfig`] without an API key,
    /// [`ResearchError::RateLimited`] on 429, or any transport, status, or
    /// decoding error.
    pub async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, ResearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResearchError::MissingConfig("ANTHROPIC_API_KEY".to_string()))?;
        let url = endpoint(&self.base_url, "v1/messages")?;

        let response = self
            .http
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;
        read_json(response, "LLM messages response").await
    }

    /// Single-turn completion without tools. Returns the response text.
    ///
    /// # Errors
    ///
    /// Same as [`LlmClient::send`], plus [`ResearchError::Llm`] when the
    /// response has no text.
    pub async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        prompt: String,
    ) -> Result<String, ResearchError> {
        let request = MessageRequest {
            model: model.to_string(),
            max_tokens,
            system: None,
            messages: vec![Message::user_text(prompt)],
            tools: Vec::new(),
            tool_choice: None,
        };
        let text = self.send(&request).await?.text();
        if text.is_empty() {
            return Err(ResearchError::Llm("response contained no text".to_string()));
        }
        Ok(text)
    }
}

/// Strip a surrounding markdown code fence, if any.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_deserialize_with_unknown_types() {
        let response: MessageResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "hello" },
                { "type": "tool_use", "id": "t1", "name": "fetch_page", "input": { "url": "https://a.com" } }
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();
        assert_eq!(response.content[0], ContentBlock::Other);
        assert_eq!(response.text(), "hello");
        assert!(response.wants_tools());
    }

    #[test]
    fn request_omits_empty_tools() {
        let request = MessageRequest {
            model: "m".into(),
            max_tokens: 10,
            system: None,
            messages: vec![Message::user_text("hi")],
            tools: Vec::new(),
            tool_choice: Some(ToolChoice::None),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("system").is_none());
        assert_eq!(value["tool_choice"]["type"], "none");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
