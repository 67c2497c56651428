//! Validation authority client

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use eve_ts3_core::ValidationVerdict;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Source of truth for character affiliation and access
#[async_trait]
pub trait ValidationAuthority: Send + Sync {
    /// Fetch verdicts for the given character ids.
    ///
    /// The authority may omit ids it knows nothing about.
    async fn validate(&self, char_ids: &[i32]) -> Result<Vec<ValidationVerdict>>;
}

/// Validation authority reached over HTTP.
///
/// POSTs the ids as a JSON array and expects a JSON array of verdicts.
pub struct HttpValidationAuthority {
    http: Client,
    endpoint: String,
}

impl HttpValidationAuthority {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("eve-ts3-service/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ValidationAuthority for HttpValidationAuthority {
    async fn validate(&self, char_ids: &[i32]) -> Result<Vec<ValidationVerdict>> {
        debug!(url = %self.endpoint, count = char_ids.len(), "Requesting validation");

        let response = self.http.post(&self.endpoint).json(char_ids).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::AuthorityStatus {
                status: status.as_u16(),
                message,
            });
        }

        let verdicts: Vec<ValidationVerdict> = response
            .json()
            .await
            .map_err(|e| SyncError::AuthorityResponse(e.to_string()))?;

        info!(requested = char_ids.len(), received = verdicts.len(), "Validation received");
        Ok(verdicts)
    }
}
