pub mod domain;
pub mod ports;
pub mod retry;

pub use domain::{
    ChatReply, ChatResponse, DailySummary, ErrorKind, GroundingSource, Message, Role, StatEntry,
    SummaryContent,
};
pub use ports::{ChatService, PortError, PortResult, SummaryService};
pub use retry::with_retry;
