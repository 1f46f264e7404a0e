//! Canonical event model
//!
//! The normalized, wire-variant-independent representation every downstream
//! consumer works with. Per-variant parsing lives in the sibling modules;
//! nothing outside `types` ever inspects a raw wire shape.

use serde::{Deserialize, Serialize};

/// One normalized chat stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// The gateway echoed the user turn; `id` is the server-side chat id.
    Start {
        id: String,
    },
    ToolCall {
        call: ToolCallPayload,
        usage: Option<ChatUsage>,
    },
    ToolResponse {
        response: ToolResponsePayload,
        usage: Option<ChatUsage>,
    },
    /// Incremental answer text.
    Chunk {
        delta: String,
    },
    /// Terminal success. `full_content` is only populated when the wire
    /// carried it (legacy `fullContent`); the session controller otherwise
    /// substitutes its accumulator.
    Complete {
        full_content: Option<String>,
        usage: Option<ChatUsage>,
    },
    /// Terminal failure with an optional machine-readable code.
    Error {
        message: String,
        code: Option<String>,
    },
}

/// Usage statistics as surfaced by the gateway.
///
/// Field names match the wire payload (`chatUsage` block / OpenAI `usage`
/// block); latency fields are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub first_byte_timeout: Option<u64>,
    #[serde(default)]
    pub elapsed_time: Option<u64>,
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

impl ChatUsage {
    /// Overlay `other` onto `self`, keeping existing values where `other`
    /// has none. Usage arrives piecemeal across records.
    pub fn update(&mut self, other: &ChatUsage) {
        if other.first_byte_timeout.is_some() {
            self.first_byte_timeout = other.first_byte_timeout;
        }
        if other.elapsed_time.is_some() {
            self.elapsed_time = other.elapsed_time;
        }
        if other.prompt_tokens.is_some() {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens.is_some() {
            self.completion_tokens = other.completion_tokens;
        }
        if other.total_tokens.is_some() {
            self.total_tokens = other.total_tokens;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_byte_timeout.is_none()
            && self.elapsed_time.is_none()
            && self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }
}

/// A tool invocation announced by the gateway. `id` correlates the eventual
/// response with this call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// The result of a previously announced tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponsePayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
}
