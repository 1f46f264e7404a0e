//! Conversation forest data model
//!
//! One `ModelConversation` per participating model; each holds ordered
//! `Conversation` turn clusters, each holding `Question`s whose `Answer`
//! versions accumulate streamed content. All types serialize camelCase for
//! the portal UI.

use aiportal_chat_stream::{ChatUsage, ToolCallPayload, ToolResponsePayload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDirection {
    Prev,
    Next,
}

/// Per-model root of conversation history (multi-model comparison mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConversation {
    pub model_id: String,
    pub display_name: String,
    /// Ambient "tool executing" indicator for this model's active stream.
    #[serde(default)]
    pub tool_running: bool,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

impl ModelConversation {
    pub fn new(model_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            display_name: display_name.into(),
            tool_running: false,
            conversations: Vec::new(),
        }
    }
}

/// One question/answer exchange turn cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub loading: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    /// Prompt text.
    pub content: String,
    pub created_at_ms: i64,
    pub active_answer_index: usize,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub tool_responses: Vec<ToolResponseRecord>,
    /// UI truncation marker; no protocol meaning.
    #[serde(default)]
    pub is_new_question: bool,
}

/// One attempt's worth of generated content. Regeneration appends a new
/// version; completed versions are never mutated again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Empty when the version completed (or is still streaming) cleanly.
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub content: String,
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

impl Answer {
    pub fn apply_usage(&mut self, usage: &ChatUsage) {
        self.first_byte_timeout = usage.first_byte_timeout;
        self.elapsed_time = usage.elapsed_time;
        self.prompt_tokens = usage.prompt_tokens;
        self.completion_tokens = usage.completion_tokens;
        self.total_tokens = usage.total_tokens;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

impl From<&ToolCallPayload> for ToolCallRecord {
    fn from(call: &ToolCallPayload) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
}

impl From<&ToolResponsePayload> for ToolResponseRecord {
    fn from(response: &ToolResponsePayload) -> Self {
        Self {
            id: response.id.clone(),
            name: response.name.clone(),
            output: response.output.clone(),
        }
    }
}
