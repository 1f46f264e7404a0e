//! Status-based envelope (legacy compatibility variant)
//!
//! `{ status, chatId?, content?, fullContent?, message?, code? }`. Older
//! gateway builds emit this shape; it maps onto the same canonical events.

use super::canonical::ChatStreamEvent;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyStatus {
    Start,
    Chunk,
    Complete,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEnvelope {
    pub status: LegacyStatus,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub full_content: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Observed as both a string and a number in the wild.
    #[serde(default)]
    pub code: Option<Value>,
}

impl LegacyEnvelope {
    pub fn into_event(self) -> ChatStreamEvent {
        match self.status {
            LegacyStatus::Start => ChatStreamEvent::Start {
                id: self.chat_id.unwrap_or_default(),
            },
            LegacyStatus::Chunk => ChatStreamEvent::Chunk {
                delta: self.content.unwrap_or_default(),
            },
            LegacyStatus::Complete => ChatStreamEvent::Complete {
                full_content: self.full_content.filter(|content| !content.is_empty()),
                usage: None,
            },
            LegacyStatus::Error => ChatStreamEvent::Error {
                message: self
                    .message
                    .unwrap_or_else(|| "chat stream reported an error".to_string()),
                code: normalize_code(self.code),
            },
        }
    }
}

fn normalize_code(code: Option<Value>) -> Option<String> {
    match code {
        Some(Value::String(code)) => Some(code),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::canonical::ChatStreamEvent;
    use super::LegacyEnvelope;

    fn parse(raw: &str) -> ChatStreamEvent {
        serde_json::from_str::<LegacyEnvelope>(raw)
            .expect("valid legacy envelope")
            .into_event()
    }

    #[test]
    fn status_start_maps_to_start() {
        assert_eq!(
            parse(r#"{"status":"start","chatId":"c-9"}"#),
            ChatStreamEvent::Start { id: "c-9".to_string() }
        );
    }

    #[test]
    fn status_complete_carries_full_content() {
        assert_eq!(
            parse(r#"{"status":"complete","fullContent":"Hi there"}"#),
            ChatStreamEvent::Complete {
                full_content: Some("Hi there".to_string()),
                usage: None,
            }
        );
    }

    #[test]
    fn numeric_code_is_normalized_to_string() {
        assert_eq!(
            parse(r#"{"status":"error","message":"too many requests","code":429}"#),
            ChatStreamEvent::Error {
                message: "too many requests".to_string(),
                code: Some("429".to_string()),
            }
        );
    }
}
