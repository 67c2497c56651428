/// Server configuration
use crate::error::{Result, ServerError};
use eve_ts3_core::ServerGroupId;
use eve_ts3_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_server")]
    pub server: ServerSettings,

    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default = "default_ts3")]
    pub ts3: Ts3Settings,

    #[serde(default = "default_validation")]
    pub validation: ValidationSettings,

    #[serde(default = "default_schedule")]
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Ts3Settings {
    /// ServerQuery address, `host:port`
    #[serde(default = "default_ts3_address")]
    pub address: String,

    #[serde(default = "default_ts3_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_server_id")]
    pub server_id: u32,

    /// Group cloned for new affiliations
    #[serde(default = "default_reference_group_id")]
    pub reference_group_id: u64,

    /// Group left alone when a user is deactivated
    #[serde(default = "default_exempt_group_id")]
    pub exempt_group_id: u64,

    #[serde(default = "default_register_ttl_secs")]
    pub register_ttl_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationSettings {
    #[serde(default = "default_validation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_validation_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

impl ServerConfig {
    /// Load configuration from file and environment.
    ///
    /// Without an explicit path, `config.toml` is read if present.
    /// Environment variables prefixed `EVETS3_` override file values, with
    /// `__` between section and key (`EVETS3_TS3__PASSWORD`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ServerError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("EVETS3")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Default configuration rendered as TOML
    pub fn template() -> Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ts3.address.trim().is_empty() {
            return Err(ServerError::Config("ts3.address is required".to_string()));
        }

        if self.ts3.user.trim().is_empty() {
            return Err(ServerError::Config("ts3.user is required".to_string()));
        }

        let durations = [
            ("ts3.register_ttl_secs", self.ts3.register_ttl_secs),
            ("ts3.command_timeout_secs", self.ts3.command_timeout_secs),
            ("validation.interval_secs", self.validation.interval_secs),
            ("validation.request_timeout_secs", self.validation.request_timeout_secs),
            ("schedule.keepalive_secs", self.schedule.keepalive_secs),
            ("schedule.sweep_secs", self.schedule.sweep_secs),
        ];
        for (key, value) in durations {
            if value == 0 {
                return Err(ServerError::Config(format!("{} must be greater than 0", key)));
            }
        }

        let endpoint = self.validation.endpoint.as_str();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ServerError::Config(format!(
                "validation.endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        Ok(())
    }

    /// Engine settings derived from this configuration
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            address: self.ts3.address.clone(),
            user: self.ts3.user.clone(),
            password: self.ts3.password.clone(),
            server_id: self.ts3.server_id,
            reference_group: ServerGroupId::new(self.ts3.reference_group_id),
            exempt_group: ServerGroupId::new(self.ts3.exempt_group_id),
            register_ttl: Duration::from_secs(self.ts3.register_ttl_secs),
            keepalive_interval: Duration::from_secs(self.schedule.keepalive_secs),
            sweep_interval: Duration::from_secs(self.schedule.sweep_secs),
            validation_interval: Duration::from_secs(self.validation.interval_secs),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.ts3.command_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.validation.request_timeout_secs)
    }
}

// Default values
fn default_server() -> ServerSettings {
    ServerSettings {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8083
}

fn default_storage() -> StorageSettings {
    StorageSettings {
        database_url: default_database_url(),
    }
}

fn default_database_url() -> String {
    "sqlite://./data/eve-ts3.db".to_string()
}

fn default_ts3() -> Ts3Settings {
    Ts3Settings {
        address: default_ts3_address(),
        user: default_ts3_user(),
        password: String::new(),
        server_id: default_server_id(),
        reference_group_id: default_reference_group_id(),
        exempt_group_id: default_exempt_group_id(),
        register_ttl_secs: default_register_ttl_secs(),
        command_timeout_secs: default_command_timeout_secs(),
    }
}

fn default_ts3_address() -> String {
    "127.0.0.1:10011".to_string()
}

fn default_ts3_user() -> String {
    "serveradmin".to_string()
}

fn default_server_id() -> u32 {
    1
}

fn default_reference_group_id() -> u64 {
    7
}

fn default_exempt_group_id() -> u64 {
    6
}

fn default_register_ttl_secs() -> u64 {
    300
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_validation() -> ValidationSettings {
    ValidationSettings {
        endpoint: default_validation_endpoint(),
        interval_secs: default_validation_interval_secs(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_validation_endpoint() -> String {
    "http://127.0.0.1:8081/api/validation/ts3".to_string()
}

fn default_validation_interval_secs() -> u64 {
    20 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_schedule() -> ScheduleSettings {
    ScheduleSettings {
        keepalive_secs: default_keepalive_secs(),
        sweep_secs: default_sweep_secs(),
    }
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_sweep_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            ts3: default_ts3(),
            validation: default_validation(),
            schedule: default_schedule(),
        }
    }
}
