//! Envelope classification and normalization
//!
//! Inspects each decoded record, decides which of the three wire variants it
//! is, and emits exactly one canonical event (or skips the record). A
//! malformed record is logged and dropped; it must never abort the stream.

use crate::types::canonical::{ChatStreamEvent, ChatUsage};
use crate::types::legacy::LegacyEnvelope;
use crate::types::openai::{CompletionChunk, CHAT_COMPLETION_CHUNK_OBJECT};
use crate::types::tagged::TaggedEnvelope;
use log::{trace, warn};
use serde_json::Value;

fn is_completion_chunk(record: &Value) -> bool {
    matches!(
        record.get("object").and_then(|value| value.as_str()),
        Some(CHAT_COMPLETION_CHUNK_OBJECT)
    )
}

fn extract_error_message(record: &Value) -> Option<String> {
    let error = record.get("error")?;
    if let Some(message) = error.get("message").and_then(|value| value.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("chat stream reported an error".to_string())
}

/// Per-stream classifier. The only state is the usage block cached from
/// OpenAI-compatible chunks, so interleaved variants within one stream never
/// cross-contaminate.
#[derive(Debug, Default)]
pub struct EnvelopeClassifier {
    cached_usage: Option<ChatUsage>,
}

impl EnvelopeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize one record payload, or `None` to skip it.
    pub fn classify(&mut self, raw: &str) -> Option<ChatStreamEvent> {
        let record: Value = match serde_json::from_str(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed chat record: error={}, data={}", e, raw);
                return None;
            }
        };

        if record.get("msgType").is_some() {
            return match serde_json::from_value::<TaggedEnvelope>(record) {
                Ok(envelope) => envelope.into_event(),
                Err(e) => {
                    warn!("Skipping malformed tagged envelope: error={}, data={}", e, raw);
                    None
                }
            };
        }

        if record.get("status").is_some() {
            return match serde_json::from_value::<LegacyEnvelope>(record) {
                Ok(envelope) => Some(envelope.into_event()),
                Err(e) => {
                    warn!("Skipping malformed legacy envelope: error={}, data={}", e, raw);
                    None
                }
            };
        }

        if is_completion_chunk(&record) {
            return match serde_json::from_value::<CompletionChunk>(record) {
                Ok(chunk) => self.classify_completion_chunk(chunk, raw),
                Err(e) => {
                    warn!("Skipping malformed completion chunk: error={}, data={}", e, raw);
                    None
                }
            };
        }

        if let Some(message) = extract_error_message(&record) {
            return Some(ChatStreamEvent::Error { message, code: None });
        }

        warn!("Skipping chat record with unrecognized shape: data={}", raw);
        None
    }

    fn classify_completion_chunk(
        &mut self,
        chunk: CompletionChunk,
        raw: &str,
    ) -> Option<ChatStreamEvent> {
        let (delta, usage, has_choices) = chunk.into_parts();

        if let Some(usage) = usage {
            match self.cached_usage.as_mut() {
                Some(cached) => cached.update(&usage),
                None => self.cached_usage = Some(usage),
            }
        }

        match delta {
            Some(delta) => Some(ChatStreamEvent::Chunk { delta }),
            None => {
                if has_choices {
                    // finish_reason-only chunk; the terminator record follows.
                    trace!("Completion chunk without content delta: data={}", raw);
                } else if self.cached_usage.is_none() {
                    warn!("Ignoring completion chunk with empty choices and no usage: {}", raw);
                }
                None
            }
        }
    }

    /// Hand the cached OpenAI usage to the terminal event. Clears the cache.
    pub fn take_cached_usage(&mut self) -> Option<ChatUsage> {
        self.cached_usage.take()
    }
}
