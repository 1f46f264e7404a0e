// AIPortal chat core - conversation state and multi-model coordination

pub mod conversation;
pub mod coordinator;
pub mod errors;
pub mod events;

pub use conversation::{
    Answer, Conversation, ConversationStore, ModelConversation, Question, ToolCallRecord,
    ToolResponseRecord, VersionDirection,
};
pub use coordinator::{ChatCoordinator, QuestionRef, SubmitOptions};
pub use errors::{PortalError, PortalResult};
pub use events::{UiEvent, UiEventBus};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
