/// API route modules
pub mod health;
pub mod register;

use crate::error::ServerError;

/// Fallback for unknown routes
pub async fn not_found() -> ServerError {
    ServerError::NotFound("no such route".to_string())
}
