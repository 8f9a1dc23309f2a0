use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a conversation turn. Unrecognised roles deserialize as `Other`
/// and are treated like any other non-assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// Request from client to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

/// Single-shot completion body: `{"choices":[{"message":{...}}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: ChatMessage::assistant(content),
            }],
        }
    }
}

/// One streamed delta: `{"choices":[{"delta":{"content":...}}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub content: String,
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            choices: vec![StreamChoice {
                delta: StreamDelta {
                    content: text.into(),
                },
            }],
        }
    }
}

/// In-band failure frame sent on the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub error: String,
}

/// Request-level failure body for non-streaming calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

impl HealthResponse {
    pub fn healthy(model: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            model: model.into(),
        }
    }
}
