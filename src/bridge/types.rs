//! Request and response types for the chat completions bridge
//!
//! The inbound side accepts the OpenAI chat message shape loosely: roles are
//! free-form strings and content parts of unknown types are kept but ignored.
//! The outbound side mirrors OpenAI's `chat.completion` and
//! `chat.completion.chunk` objects.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Role of every message produced by the bridge
pub const ASSISTANT_ROLE: &str = "assistant";

/// Finish reason reported when the upstream turn ends
pub const FINISH_REASON_STOP: &str = "stop";

/// A single typed part of list-form message content
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContentPart {
    /// Part type, e.g. `text` or `image_url`
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload, present on `text` parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentPart {
    /// Text contributed to a prompt: the `text` of a text part, nothing otherwise
    pub fn text_contribution(&self) -> &str {
        if self.kind == "text" {
            self.text.as_deref().unwrap_or_default()
        } else {
            ""
        }
    }
}

// Parts are accepted in any shape; anything that is not an object, or lacks a
// string `type`, simply becomes a part that contributes nothing.
impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let text = value.get("text").and_then(Value::as_str).map(str::to_string);

        Ok(Self { kind, text })
    }
}

/// Message content - either plain text or a list of parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Multimodal content; only text parts are used
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

/// One message of the inbound conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Author role; missing or empty means `user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Message content; missing or null is treated as empty text
    #[serde(default)]
    pub content: Option<Content>,
}

impl ChatMessage {
    /// Plain-text message helper
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(Content::Text(content.into())),
        }
    }

    /// Role used when flattening, defaulting to `user`
    pub fn role_or_user(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => "user",
        }
    }
}

/// Inbound chat completion request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Ignored; the bridge serves a single model
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Accepted for compatibility; Emohaa has no search mode
    #[serde(default)]
    pub use_search: bool,
}

/// Usage statistics. Emohaa reports none, so every count is zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Identity shared by every object produced for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    /// Completion id; the upstream session id
    pub id: String,
    pub model: String,
    /// Unix timestamp (seconds), captured once per turn
    pub created: i64,
}

/// Assistant message in a buffered completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

/// Choice in a buffered completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: String,
}

/// Buffered (non-streaming) chat completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResult {
    pub id: String,
    pub model: String,
    pub object: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
    pub created: i64,
}

impl CompletionResult {
    /// Wrap the accumulated assistant text in a `chat.completion` object
    pub fn new(meta: &CompletionMeta, content: String) -> Self {
        Self {
            id: meta.id.clone(),
            model: meta.model.clone(),
            object: "chat.completion".to_string(),
            choices: vec![CompletionChoice {
                index: 0,
                message: ChoiceMessage {
                    role: ASSISTANT_ROLE.to_string(),
                    content,
                },
                finish_reason: FINISH_REASON_STOP.to_string(),
            }],
            usage: Usage::default(),
            created: meta.created,
        }
    }

    /// Assistant text of the first choice
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or_default()
    }
}

/// Incremental delta in a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    /// Only present in the first chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    /// `null` until the finish chunk
    pub finish_reason: Option<String>,
}

/// Streaming chunk for chat completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    pub id: String,
    pub model: String,
    pub object: String,
    pub choices: Vec<StreamChoice>,
    /// Only on the finish chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub created: i64,
}

impl StreamChunk {
    /// Create a chunk carrying the turn's identity
    pub fn new(
        meta: &CompletionMeta,
        delta: Delta,
        finish_reason: Option<&str>,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: meta.id.clone(),
            model: meta.model.clone(),
            object: "chat.completion.chunk".to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage,
            created: meta.created,
        }
    }
}
