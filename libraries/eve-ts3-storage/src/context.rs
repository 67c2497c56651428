use crate::users;
use async_trait::async_trait;
use eve_ts3_core::{error::Result, NewUser, User, UserStore};
use sqlx::SqlitePool;

/// User store backed by `SQLite`
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        Ok(users::create(&self.pool, &user).await?)
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(users::get_all(&self.pool).await?)
    }

    async fn active_character_ids(&self) -> Result<Vec<i32>> {
        Ok(users::active_character_ids(&self.pool).await?)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        Ok(users::update(&self.pool, user).await?)
    }

    async fn update_user_by_uid(&self, user: &NewUser) -> Result<()> {
        Ok(users::update_by_uid(&self.pool, user).await?)
    }

    async fn set_user_inactive_by_uid(&self, uid: &str) -> Result<()> {
        Ok(users::set_inactive_by_uid(&self.pool, uid).await?)
    }

    async fn uid_exists(&self, uid: &str) -> Result<bool> {
        Ok(users::uid_exists(&self.pool, uid).await?)
    }
}
