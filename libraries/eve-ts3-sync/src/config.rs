//! Engine settings

use eve_ts3_core::ServerGroupId;
use std::time::Duration;

/// Settings the sync engine needs from the process configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// ServerQuery address, `host:port`
    pub address: String,
    pub user: String,
    pub password: String,
    /// Virtual server to select after login
    pub server_id: u32,
    /// Group cloned when a new affiliation group is needed
    pub reference_group: ServerGroupId,
    /// Group never touched by bulk removal
    pub exempt_group: ServerGroupId,
    /// How long a registration waits for its client to connect
    pub register_ttl: Duration,
    pub keepalive_interval: Duration,
    pub sweep_interval: Duration,
    pub validation_interval: Duration,
}

impl SyncConfig {
    /// Registration TTL in whole seconds
    pub fn register_ttl_secs(&self) -> i64 {
        i64::try_from(self.register_ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:10011".to_string(),
            user: "serveradmin".to_string(),
            password: String::new(),
            server_id: 1,
            reference_group: ServerGroupId::new(7),
            exempt_group: ServerGroupId::new(6),
            register_ttl: Duration::from_secs(300),
            keepalive_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            validation_interval: Duration::from_secs(20 * 60),
        }
    }
}
