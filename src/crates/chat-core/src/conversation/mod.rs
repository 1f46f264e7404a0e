//! Conversation tree engine
//!
//! Data model and store for the per-model conversation forest.

pub mod manager;
pub mod types;

pub use manager::ConversationStore;
pub use types::{
    Answer, Conversation, ModelConversation, Question, ToolCallRecord, ToolResponseRecord,
    VersionDirection,
};
