//! Sync engine errors

use eve_ts3_core::CoreError;
use eve_ts3_query::QueryError;
use thiserror::Error;

/// Result type alias using `SyncError`
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while synchronizing group membership
#[derive(Error, Debug)]
pub enum SyncError {
    /// ServerQuery command or connection failure
    #[error("ServerQuery error: {0}")]
    Query(#[from] QueryError),

    /// User store failure
    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    /// Validation authority could not be reached
    #[error("Validation request failed: {0}")]
    AuthorityRequest(#[from] reqwest::Error),

    /// Validation authority answered with a non-success status
    #[error("Validation authority returned {status}: {message}")]
    AuthorityStatus { status: u16, message: String },

    /// Validation authority answered with an unreadable body
    #[error("Failed to parse validation response: {0}")]
    AuthorityResponse(String),

    /// A reply from the TS3 server lacked an expected field
    #[error("{command}: missing or invalid '{field}' in reply")]
    UnexpectedReply { command: String, field: String },

    /// A notification lacked an expected field
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// No ServerQuery session is established
    #[error("Not connected to the TS3 server")]
    NotConnected,

    /// Lifecycle operation not allowed in the current state
    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}
