//! OpenAI-compatible chunk (third wire variant)
//!
//! Gateways fronting an OpenAI-compatible upstream pass its
//! `chat.completion.chunk` records through unmodified. Only the first
//! choice's content delta is significant; a populated `usage` block may ride
//! on any chunk (typically a final empty-choices one) and is cached by the
//! classifier for the eventual completion.

use super::canonical::ChatUsage;
use serde::Deserialize;

pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl From<CompletionUsage> for ChatUsage {
    fn from(usage: CompletionUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChunk {
    #[allow(dead_code)]
    #[serde(default)]
    id: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

impl CompletionChunk {
    /// Decompose into (content delta, usage, had any choices).
    pub fn into_parts(self) -> (Option<String>, Option<ChatUsage>, bool) {
        let usage = self.usage.map(ChatUsage::from);
        let has_choices = !self.choices.is_empty();
        let delta = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content);
        (delta, usage, has_choices)
    }
}
