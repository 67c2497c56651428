//! TeamSpeak 3 ServerQuery client
//!
//! Line-oriented command/response client for the TS3 ServerQuery interface,
//! with out-of-band notification delivery.
//!
//! # Features
//!
//! - **Commands**: typed builders for the commands the sync engine issues
//! - **Replies**: parsed `key=value` records and `error id=.. msg=..` status
//! - **Notifications**: `notify*` lines dispatched to a registered handler
//! - **Seams**: [`ServerQuery`] and [`Connector`] traits so callers can run
//!   against an in-memory server in tests
//!
//! # Example
//!
//! ```ignore
//! use eve_ts3_query::{Command, Connector, TcpConnector};
//!
//! let connector = TcpConnector::default();
//! let query = connector.connect("127.0.0.1:10011").await?;
//! query.execute(Command::login("serveradmin", "secret")).await?;
//! query.execute(Command::use_server(1)).await?;
//! let groups = query.execute(Command::server_group_list()).await?;
//! for group in groups.records() {
//!     println!("{} -> {}", group["sgid"], group["name"]);
//! }
//! query.close().await;
//! ```

mod client;
mod command;
mod error;
mod escape;
mod notification;
mod reply;

use async_trait::async_trait;
use std::sync::Arc;

pub use client::{QueryClient, TcpConnector};
pub use command::Command;
pub use error::{QueryError, Result};
pub use escape::{escape, unescape};
pub use notification::{Notification, NotificationHandler};
pub use reply::{Record, Reply};

/// Status id for a successful command
pub const ERROR_OK: u32 = 0;

/// Status id the server returns when a query matched nothing
pub const ERROR_DATABASE_EMPTY_RESULT: u32 = 1281;

/// Status id the server returns when an entry already exists
pub const ERROR_DUPLICATE_ENTRY: u32 = 2561;

/// An established ServerQuery session.
#[async_trait]
pub trait ServerQuery: Send + Sync {
    /// Send one command and wait for its reply
    async fn execute(&self, command: Command) -> Result<Reply>;

    /// Register the handler that receives every notification.
    ///
    /// Replaces any previously registered handler. The handler runs on the
    /// connection's reader task and must not block.
    fn on_notification(&self, handler: NotificationHandler);

    /// Close the connection; pending and later commands fail with
    /// [`QueryError::ConnectionClosed`]
    async fn close(&self);
}

/// Opens ServerQuery sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `address` (`host:port`) and complete the greeting
    async fn connect(&self, address: &str) -> Result<Arc<dyn ServerQuery>>;
}
