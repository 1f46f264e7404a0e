//! Wire envelope types
//!
//! One module per wire variant, each converting into the canonical model.

pub mod canonical;
pub mod legacy;
pub mod openai;
pub mod tagged;

pub use canonical::{ChatStreamEvent, ChatUsage, ToolCallPayload, ToolResponsePayload};
