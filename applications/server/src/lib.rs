//! EVE TS3 Server Library
//!
//! HTTP front end and process wiring for the TS3 group synchronization
//! service.
//!
//! This library exposes the core components for testing purposes.

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;

/// Build the HTTP router
pub fn create_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/ts3/v1/createregisterrecord",
            get(api::register::create_register_record),
        );

    Router::new()
        .nest("/api", api_routes)
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}
