//! Registration trigger called by the authentication site

use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eve_ts3_core::Character;
use serde::Deserialize;

/// Cookie holding the base64 JSON character payload
pub const CHARACTER_COOKIE: &str = "char";

/// Character payload set by the authentication site
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CharacterPayload {
    #[serde(rename = "EveCharID")]
    pub eve_char_id: i32,
    #[serde(rename = "EveCorpID", default)]
    pub eve_corp_id: i32,
    #[serde(rename = "EveAlliID", default)]
    pub eve_alli_id: i32,
    #[serde(rename = "EveCharName")]
    pub eve_char_name: String,
    #[serde(rename = "EveCorpName", default)]
    pub eve_corp_name: String,
    #[serde(rename = "EveAlliName", default)]
    pub eve_alli_name: String,
    #[serde(rename = "EveCorpTicker", default)]
    pub eve_corp_ticker: String,
    #[serde(rename = "EveAlliTicker", default)]
    pub eve_alli_ticker: String,
    #[serde(rename = "Valid", default)]
    pub valid: bool,
}

impl CharacterPayload {
    /// Decode a cookie value: base64 of the JSON payload
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ServerError::BadRequest(format!("invalid base64 in cookie: {}", e)))?;

        let payload: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ServerError::BadRequest(format!("invalid character payload: {}", e)))?;

        if payload.eve_char_name.trim().is_empty() {
            return Err(ServerError::BadRequest(
                "character payload has no name".to_string(),
            ));
        }

        Ok(payload)
    }

    pub fn into_character(self) -> Character {
        Character::new(
            self.eve_char_id,
            self.eve_char_name,
            self.eve_corp_ticker,
            self.eve_alli_ticker,
        )
    }
}

/// Value of cookie `name` across all `Cookie` headers
fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

/// GET /api/ts3/v1/createregisterrecord - Queue a registration
///
/// Responds with the registration TTL in seconds.
pub async fn create_register_record(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<i64>> {
    let encoded = cookie(&headers, CHARACTER_COOKIE).ok_or_else(|| {
        ServerError::BadRequest(format!("missing '{}' cookie", CHARACTER_COOKIE))
    })?;

    let payload = CharacterPayload::decode(encoded)?;
    tracing::debug!(
        char_id = payload.eve_char_id,
        character = %payload.eve_char_name,
        "Registration requested"
    );

    let ttl = state.engine.create_register_record(payload.into_character());
    Ok(Json(ttl))
}
