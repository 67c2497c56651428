/// User and character types
use super::ids::ClientDbId;
use serde::{Deserialize, Serialize};

/// Build the server group name for an affiliation: `"<alliance> <corp>"`.
pub fn group_name(alliance_ticker: &str, corp_ticker: &str) -> String {
    format!("{} {}", alliance_ticker, corp_ticker)
}

/// In-game identity carried by a registration, before a TS3 client is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub eve_char_id: i32,
    pub eve_char_name: String,
    pub eve_corp_ticker: String,
    pub eve_alli_ticker: String,
}

impl Character {
    /// Create a new character
    pub fn new(
        eve_char_id: i32,
        eve_char_name: impl Into<String>,
        eve_corp_ticker: impl Into<String>,
        eve_alli_ticker: impl Into<String>,
    ) -> Self {
        Self {
            eve_char_id,
            eve_char_name: eve_char_name.into(),
            eve_corp_ticker: eve_corp_ticker.into(),
            eve_alli_ticker: eve_alli_ticker.into(),
        }
    }

    /// Name of the server group this character belongs in
    pub fn group_name(&self) -> String {
        group_name(&self.eve_alli_ticker, &self.eve_corp_ticker)
    }
}

/// A persisted TS3 user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub eve_char_id: i32,
    pub eve_char_name: String,
    pub eve_corp_ticker: String,
    pub eve_alli_ticker: String,
    pub ts3_uid: String,
    pub ts3_cldbid: ClientDbId,
    pub active: bool,
}

impl User {
    /// Name of the server group the stored tickers map to
    pub fn group_name(&self) -> String {
        group_name(&self.eve_alli_ticker, &self.eve_corp_ticker)
    }
}

/// A user about to be inserted, or re-bound to a known TS3 identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub eve_char_id: i32,
    pub eve_char_name: String,
    pub eve_corp_ticker: String,
    pub eve_alli_ticker: String,
    pub ts3_uid: String,
    pub ts3_cldbid: ClientDbId,
    pub active: bool,
}

impl NewUser {
    /// Bind a registered character to the TS3 client that confirmed it
    pub fn confirmed(character: Character, ts3_uid: impl Into<String>, ts3_cldbid: ClientDbId) -> Self {
        Self {
            eve_char_id: character.eve_char_id,
            eve_char_name: character.eve_char_name,
            eve_corp_ticker: character.eve_corp_ticker,
            eve_alli_ticker: character.eve_alli_ticker,
            ts3_uid: ts3_uid.into(),
            ts3_cldbid,
            active: true,
        }
    }
}
