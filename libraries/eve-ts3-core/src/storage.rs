//! Store contract for persisted TS3 users

use crate::error::Result;
use crate::types::{NewUser, User};
use async_trait::async_trait;

/// Durable table of known users keyed by their TS3 unique identifier.
///
/// Records are never deleted; revoked users are flagged inactive in place.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user and return it with its surrogate id
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get all users, active and inactive
    async fn users(&self) -> Result<Vec<User>>;

    /// Get character ids of all active users
    async fn active_character_ids(&self) -> Result<Vec<i32>>;

    /// Overwrite every field of the user addressed by `user.id`
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Overwrite every field of the user addressed by `user.ts3_uid`
    async fn update_user_by_uid(&self, user: &NewUser) -> Result<()>;

    /// Flag the user with the given TS3 unique identifier as inactive
    async fn set_user_inactive_by_uid(&self, uid: &str) -> Result<()>;

    /// Check whether a record with the given TS3 unique identifier exists
    async fn uid_exists(&self, uid: &str) -> Result<bool>;
}
