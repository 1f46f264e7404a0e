//! Tagged envelope (primary wire variant)
//!
//! `{ chatId, msgType, content, chatUsage?, error?, message? }` where
//! `msgType` selects the record's meaning.

use super::canonical::{ChatStreamEvent, ChatUsage, ToolCallPayload, ToolResponsePayload};
use log::warn;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TaggedMsgType {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "TOOL_CALL")]
    ToolCall,
    #[serde(rename = "TOOL_RESPONSE")]
    ToolResponse,
    #[serde(rename = "ANSWER")]
    Answer,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedEnvelope {
    #[serde(default)]
    pub chat_id: Option<String>,
    pub msg_type: TaggedMsgType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub chat_usage: Option<ChatUsage>,
    /// Machine-readable error code.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,
}

impl TaggedEnvelope {
    /// Map to the canonical event, or `None` for records whose embedded
    /// payload does not parse (skipped, never fatal).
    pub fn into_event(self) -> Option<ChatStreamEvent> {
        match self.msg_type {
            TaggedMsgType::User => Some(ChatStreamEvent::Start {
                id: self.chat_id.unwrap_or_default(),
            }),
            TaggedMsgType::Answer => Some(ChatStreamEvent::Chunk {
                delta: self.content.unwrap_or_default(),
            }),
            TaggedMsgType::ToolCall => {
                let Some(raw) = self.content else {
                    warn!("Skipping TOOL_CALL record with no content");
                    return None;
                };
                match serde_json::from_str::<ToolCallPayload>(&raw) {
                    Ok(call) => Some(ChatStreamEvent::ToolCall {
                        call,
                        usage: self.chat_usage,
                    }),
                    Err(e) => {
                        warn!("Skipping malformed tool call payload: error={}, data={}", e, raw);
                        None
                    }
                }
            }
            TaggedMsgType::ToolResponse => {
                let Some(raw) = self.content else {
                    warn!("Skipping TOOL_RESPONSE record with no content");
                    return None;
                };
                match serde_json::from_str::<ToolResponsePayload>(&raw) {
                    Ok(response) => Some(ChatStreamEvent::ToolResponse {
                        response,
                        usage: self.chat_usage,
                    }),
                    Err(e) => {
                        warn!(
                            "Skipping malformed tool response payload: error={}, data={}",
                            e, raw
                        );
                        None
                    }
                }
            }
            TaggedMsgType::Stop => Some(ChatStreamEvent::Complete {
                full_content: self.content.filter(|content| !content.is_empty()),
                usage: self.chat_usage,
            }),
            TaggedMsgType::Error => {
                let message = self
                    .message
                    .or(self.content)
                    .unwrap_or_else(|| "chat stream reported an error".to_string());
                Some(ChatStreamEvent::Error {
                    message,
                    code: self.error,
                })
            }
        }
    }
}
