// AIPortal chat stream ingestion
// Raw bytes -> frames -> canonical events -> observer callbacks

pub mod classifier;
pub mod config;
pub mod frame;
pub mod request;
pub mod session;
pub mod types;

pub use classifier::EnvelopeClassifier;
pub use config::GatewayConfig;
pub use frame::{Frame, FrameDecoder};
pub use request::{build_chat_request, ChatRequestBody};
pub use session::{SessionAuthority, StreamObserver, StreamSessionController};
pub use types::canonical::{ChatStreamEvent, ChatUsage, ToolCallPayload, ToolResponsePayload};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
