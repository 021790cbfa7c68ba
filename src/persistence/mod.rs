pub mod event_log;
pub mod memory;
pub mod models;
pub mod naming;
pub mod reader;

pub use event_log::{EventLogger, LogEvent};
pub use memory::{ConversationMemory, MemoryMetadata, MemorySummary};
pub use models::{
    DeleteReport, LoadedSession, Message, Role, SessionStatistics, SessionSummary,
};
pub use naming::{LogFileName, SessionManifest};
pub use reader::SessionIndex;
