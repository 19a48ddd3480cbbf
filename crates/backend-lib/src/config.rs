// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered from an optional TOML file and `MEETWIRE__*`
//! environment variables (`MEETWIRE__SERVER__PORT=4000`). Every field has a
//! default so an empty environment yields a runnable server.
use anyhow::{anyhow, bail, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::gate::JoinPolicy;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Upper bound of `meetings.activation_horizon_secs` (one week)
pub const MAX_ACTIVATION_HORIZON_SECS: u64 = 7 * 24 * 60 * 60;
/// Upper bound of `meetings.scan_interval_secs` (one day)
pub const MAX_SCAN_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Application settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
    pub meetings: MeetingSettings,
    pub chat: ChatSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Origins allowed by CORS; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for bearer tokens
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeetingSettings {
    pub join_policy: JoinPolicy,
    /// Path prefix of generated meeting URLs
    pub url_prefix: String,
    pub scan_interval_secs: u64,
    pub activation_horizon_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub history_limit: usize,
    /// Deliver room-less chat messages to every connection
    pub broadcast_without_room: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            outbound_buffer: 64,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 100,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
        }
    }
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            join_policy: JoinPolicy::Lenient,
            url_prefix: "/meeting-room".to_string(),
            scan_interval_secs: 60,
            activation_horizon_secs: 5 * 60,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            broadcast_without_room: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl MeetingSettings {
    /// How far ahead the activation scanner looks
    pub fn activation_horizon(&self) -> Result<chrono::Duration> {
        i64::try_from(self.activation_horizon_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| anyhow!("meetings.activation_horizon_secs is out of range"))
    }
}

impl Settings {
    /// Load settings from `config/default.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from the given file (if present) and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("MEETWIRE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if self.server.outbound_buffer == 0 {
            bail!("server.outbound_buffer must be greater than zero");
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit.max_requests and rate_limit.window_secs must be greater than zero");
        }
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.meetings.scan_interval_secs == 0
            || self.meetings.scan_interval_secs > MAX_SCAN_INTERVAL_SECS
        {
            bail!("meetings.scan_interval_secs must be between 1 and {MAX_SCAN_INTERVAL_SECS}");
        }
        if self.meetings.activation_horizon_secs > MAX_ACTIVATION_HORIZON_SECS {
            bail!("meetings.activation_horizon_secs must be at most {MAX_ACTIVATION_HORIZON_SECS}");
        }
        if self.chat.history_limit == 0 {
            bail!("chat.history_limit must be greater than zero");
        }
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            bail!("logging.level must be one of {LEVELS:?}");
        }
        Ok(())
    }

    /// Socket address the HTTP server binds to. `server.host` may be an IP
    /// address or a resolvable name such as `localhost`.
    pub async fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self.server.host.as_str();
        tokio::net::lookup_host((host, self.server.port))
            .await?
            .next()
            .ok_or_else(|| anyhow!("server.host {host:?} did not resolve to an address"))
    }

    pub fn get_rate_limit_settings(&self) -> &RateLimitSettings {
        &self.rate_limit
    }
}
