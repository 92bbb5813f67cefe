//! crates/sparklog_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic,
//! the generic error type they return and the classification rules that map
//! those errors to the coarse user-facing kinds.

use async_trait::async_trait;

use crate::domain::{ChatReply, ErrorKind, Message};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the provider adapters
/// (HTTP client failures, upstream statuses, malformed model output).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// A required credential environment variable is not set. Detected
    /// before any provider call is made.
    #[error("Missing credential: the environment variable {0} is not set")]
    MissingCredential(String),
    /// A transport-level failure: connect error, timeout, DNS.
    #[error("Network error: {0}")]
    Network(String),
    /// The provider answered with a non-success HTTP status.
    #[error("Upstream service returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    /// The provider answered, but its output could not be parsed.
    #[error("Failed to parse provider output: {0}")]
    Parsing(String),
    /// A catch-all for any other unexpected errors.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Message markers treated as signs of a transient failure when no
/// structured status is available.
const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "temporarily unavailable",
    "502",
    "503",
    "504",
];

fn message_is_transient(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

impl PortError {
    /// Whether this failure is likely to succeed on retry.
    ///
    /// Network failures and upstream 5xx statuses are transient; auth and
    /// other 4xx responses are permanent. Unstructured errors fall back to
    /// message markers.
    pub fn is_transient(&self) -> bool {
        match self {
            PortError::Network(_) => true,
            PortError::Upstream { status, .. } => *status >= 500,
            PortError::Unexpected(message) => message_is_transient(message),
            PortError::MissingCredential(_) | PortError::Parsing(_) => false,
        }
    }
}

impl ErrorKind {
    /// Classifies a port error into its user-facing kind.
    ///
    /// Precedence, first match wins:
    /// 1. missing credential / status 401 / `401`/`Unauthorized` in the message
    /// 2. status 403 / `403` in the message
    /// 3. network failure / `network`/`timeout` in the message
    /// 4. status 429 / `quota`/`limit` in the message
    /// 5. parse failure / `JSON` in the message
    /// 6. anything else is a generic service error
    pub fn of(err: &PortError) -> Self {
        match err {
            PortError::MissingCredential(_) => ErrorKind::Authentication,
            PortError::Network(_) => ErrorKind::Network,
            PortError::Parsing(_) => ErrorKind::Parsing,
            PortError::Upstream { status: 401, .. } => ErrorKind::Authentication,
            PortError::Upstream { status: 403, .. } => ErrorKind::Permission,
            PortError::Upstream { status: 429, .. } => ErrorKind::Quota,
            PortError::Upstream { message, .. } | PortError::Unexpected(message) => {
                classify_message(message)
            }
        }
    }
}

/// The substring fallback for errors that carry no structured status,
/// e.g. ones surfaced by a provider SDK as plain text.
fn classify_message(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    if lowered.contains("401") || lowered.contains("unauthorized") {
        ErrorKind::Authentication
    } else if lowered.contains("403") {
        ErrorKind::Permission
    } else if lowered.contains("network") || lowered.contains("timeout") {
        ErrorKind::Network
    } else if lowered.contains("quota") || lowered.contains("limit") {
        ErrorKind::Quota
    } else if lowered.contains("json") {
        ErrorKind::Parsing
    } else {
        ErrorKind::Service
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends the latest user message, with the prior turns as context, and
    /// returns the generated reply plus any grounding citations.
    ///
    /// `history` must not contain the latest message; system-role entries
    /// in it are skipped when building provider turns.
    async fn send_message(
        &self,
        history: &[Message],
        latest: &str,
        image_base64: Option<&str>,
    ) -> PortResult<ChatReply>;
}

#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Runs one generation call over the day's transcript, constrained to
    /// the summary JSON shape, and returns the raw model text.
    async fn generate_summary(&self, transcript: &str) -> PortResult<String>;
}
