/// Validation authority verdicts
use serde::{Deserialize, Serialize};

/// Per-character verdict returned by the validation authority.
///
/// Field names match the JSON emitted by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    #[serde(rename = "EveCharID")]
    pub eve_char_id: i32,
    #[serde(rename = "EveCorpTicker", default)]
    pub eve_corp_ticker: String,
    #[serde(rename = "EveAlliTicker", default)]
    pub eve_alli_ticker: String,
    #[serde(rename = "Valid")]
    pub valid: bool,
}
