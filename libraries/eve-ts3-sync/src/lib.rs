//! EVE TS3 synchronization engine
//!
//! Keeps TS3 server group membership in line with EVE affiliation.
//!
//! Three inputs drive it:
//! - **Registrations** from the web callback, queued by character name
//!   with a TTL ([`RegistrationQueue`])
//! - **Connection notifications** from the ServerQuery stream; a fresh
//!   connection whose nickname matches a live registration gets its group
//!   ([`SyncEngine::handle_notification`])
//! - **Timers**: keepalive, queue sweep and periodic re-validation against
//!   the validation authority ([`SyncEngine::validate_users`])
//!
//! Collaborators are injected as trait objects: [`Connector`] for the
//! ServerQuery session, [`UserStore`] for persistence and
//! [`ValidationAuthority`] for the affiliation source.
//!
//! [`Connector`]: eve_ts3_query::Connector
//! [`UserStore`]: eve_ts3_core::UserStore

mod authority;
mod clock;
mod config;
mod engine;
mod error;
mod groups;
mod handler;
mod queue;
mod reconcile;
mod scheduler;

pub use authority::{HttpValidationAuthority, ValidationAuthority};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use engine::{EngineState, SyncEngine};
pub use error::{Result, SyncError};
pub use groups::GroupManager;
pub use handler::{HandleOutcome, EVENT_CLIENT_ENTER_VIEW, REASON_FRESH_CONNECTION};
pub use queue::{Claim, RegistrationQueue, RegistrationRecord};
pub use reconcile::ReconcileSummary;
