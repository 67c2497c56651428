//! TS3 user queries

use crate::StorageError;
use eve_ts3_core::{ClientDbId, NewUser, User};
use sqlx::{FromRow, SqlitePool};

type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    eve_char_id: i32,
    eve_char_name: String,
    eve_corp_ticker: String,
    eve_alli_ticker: String,
    ts3_uid: String,
    ts3_cldbid: i64,
    active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self> {
        let cldbid = u64::try_from(row.ts3_cldbid).map_err(|_| {
            StorageError::SerializationError(format!(
                "negative ts3_cldbid {} for user {}",
                row.ts3_cldbid, row.id
            ))
        })?;

        Ok(User {
            id: row.id,
            eve_char_id: row.eve_char_id,
            eve_char_name: row.eve_char_name,
            eve_corp_ticker: row.eve_corp_ticker,
            eve_alli_ticker: row.eve_alli_ticker,
            ts3_uid: row.ts3_uid,
            ts3_cldbid: ClientDbId::new(cldbid),
            active: row.active,
        })
    }
}

fn cldbid_column(id: ClientDbId) -> Result<i64> {
    i64::try_from(id.get())
        .map_err(|_| StorageError::SerializationError(format!("ts3_cldbid {} out of range", id)))
}

/// Insert a new user
///
/// # Errors
///
/// Fails if the TS3 unique identifier is already taken
pub async fn create(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let cldbid = cldbid_column(user.ts3_cldbid)?;

    let result = sqlx::query(
        "INSERT INTO users
         (eve_char_id, eve_char_name, eve_corp_ticker, eve_alli_ticker, ts3_uid, ts3_cldbid, active)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.eve_char_id)
    .bind(&user.eve_char_name)
    .bind(&user.eve_corp_ticker)
    .bind(&user.eve_alli_ticker)
    .bind(&user.ts3_uid)
    .bind(cldbid)
    .bind(user.active)
    .execute(pool)
    .await?;

    Ok(User {
        id: result.last_insert_rowid(),
        eve_char_id: user.eve_char_id,
        eve_char_name: user.eve_char_name.clone(),
        eve_corp_ticker: user.eve_corp_ticker.clone(),
        eve_alli_ticker: user.eve_alli_ticker.clone(),
        ts3_uid: user.ts3_uid.clone(),
        ts3_cldbid: user.ts3_cldbid,
        active: user.active,
    })
}

/// Get all users
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, eve_char_id, eve_char_name, eve_corp_ticker, eve_alli_ticker,
                ts3_uid, ts3_cldbid, active
         FROM users ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

/// Get a user by TS3 unique identifier
pub async fn get_by_uid(pool: &SqlitePool, uid: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, eve_char_id, eve_char_name, eve_corp_ticker, eve_alli_ticker,
                ts3_uid, ts3_cldbid, active
         FROM users WHERE ts3_uid = ?",
    )
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

/// Get character ids of active users
pub async fn active_character_ids(pool: &SqlitePool) -> Result<Vec<i32>> {
    let ids = sqlx::query_scalar::<_, i32>("SELECT eve_char_id FROM users WHERE active ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

/// Check if a record with the given TS3 unique identifier exists
pub async fn uid_exists(pool: &SqlitePool, uid: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE ts3_uid = ?)",
    )
    .bind(uid)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Overwrite a user addressed by surrogate id
pub async fn update(pool: &SqlitePool, user: &User) -> Result<()> {
    let cldbid = cldbid_column(user.ts3_cldbid)?;

    let result = sqlx::query(
        "UPDATE users
         SET eve_char_id = ?, eve_char_name = ?, eve_corp_ticker = ?, eve_alli_ticker = ?,
             ts3_uid = ?, ts3_cldbid = ?, active = ?
         WHERE id = ?",
    )
    .bind(user.eve_char_id)
    .bind(&user.eve_char_name)
    .bind(&user.eve_corp_ticker)
    .bind(&user.eve_alli_ticker)
    .bind(&user.ts3_uid)
    .bind(cldbid)
    .bind(user.active)
    .bind(user.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("User", user.id.to_string()));
    }

    Ok(())
}

/// Overwrite a user addressed by TS3 unique identifier
///
/// Used when a known TS3 identity registers again, possibly with another
/// character or from another client database entry.
pub async fn update_by_uid(pool: &SqlitePool, user: &NewUser) -> Result<()> {
    let cldbid = cldbid_column(user.ts3_cldbid)?;

    let result = sqlx::query(
        "UPDATE users
         SET eve_char_id = ?, eve_char_name = ?, eve_corp_ticker = ?, eve_alli_ticker = ?,
             ts3_cldbid = ?, active = ?
         WHERE ts3_uid = ?",
    )
    .bind(user.eve_char_id)
    .bind(&user.eve_char_name)
    .bind(&user.eve_corp_ticker)
    .bind(&user.eve_alli_ticker)
    .bind(cldbid)
    .bind(user.active)
    .bind(&user.ts3_uid)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("User", user.ts3_uid.clone()));
    }

    Ok(())
}

/// Flag a user inactive by TS3 unique identifier
///
/// Unknown identifiers are ignored.
pub async fn set_inactive_by_uid(pool: &SqlitePool, uid: &str) -> Result<()> {
    sqlx::query("UPDATE users SET active = 0 WHERE ts3_uid = ?")
        .bind(uid)
        .execute(pool)
        .await?;

    Ok(())
}
