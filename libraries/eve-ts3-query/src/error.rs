//! Error types for the ServerQuery client.

use thiserror::Error;

/// Errors that can occur when talking to a ServerQuery interface.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Socket-level failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not establish the TCP connection
    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    /// The peer did not greet like a ServerQuery interface
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The server answered with a non-zero status
    #[error("Server error {id}: {message}")]
    Server { id: u32, message: String },

    /// A reply line could not be decoded
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// No reply within the command timeout
    #[error("Command '{0}' timed out")]
    Timeout(String),

    /// The connection is gone
    #[error("Connection closed")]
    ConnectionClosed,
}

impl QueryError {
    /// Server status id, if this is a server-side error
    pub fn server_id(&self) -> Option<u32> {
        match self {
            QueryError::Server { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Result type for ServerQuery operations.
pub type Result<T> = std::result::Result<T, QueryError>;
