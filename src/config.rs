//! Terminal configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!   "wifi": { "ssid": "Lobby", "password": "secret" },
//!   "server": { "addr": "192.168.1.100", "port": 8080 }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::state::transport::ServerEndpoint;

/// Default stream port, used when a discovery reply carries none.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default datagram port for discovery probes and replies.
pub const DEFAULT_DISCOVERY_PORT: u16 = 8089;

/// Default discovery probe payload.
pub const DEFAULT_DISCOVERY_PROBE: &str = "MURDERHOUSE_DISCOVER";

/// Default prefix of a discovery reply, followed by the decimal port.
pub const DEFAULT_DISCOVERY_RESPONSE: &str = "MURDERHOUSE_SERVER:";

/// Default interval between discovery broadcasts (2 seconds).
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// Default stream reconnect interval (3 seconds).
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Default WiFi association timeout before restarting it (30 seconds).
pub const DEFAULT_WIFI_TIMEOUT: Duration = Duration::from_secs(30);

/// WiFi station credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
}

/// Discovery probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub probe: String,
    pub response_prefix: String,
    pub interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            probe: DEFAULT_DISCOVERY_PROBE.to_string(),
            response_prefix: DEFAULT_DISCOVERY_RESPONSE.to_string(),
            interval_ms: DEFAULT_DISCOVERY_INTERVAL.as_millis() as u64,
        }
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Full terminal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub wifi: WifiConfig,

    /// Static server address; skips discovery when set
    pub server: Option<ServerEndpoint>,

    /// Path requested when opening the stream
    pub stream_path: String,

    /// Port used when a discovery reply has no usable port
    pub default_port: u16,

    pub discovery: DiscoveryConfig,

    pub reconnect_interval_ms: u64,

    pub wifi_timeout_ms: u64,

    /// Re-run discovery when reconnecting stalls this long
    pub rediscover_after_ms: Option<u64>,

    /// Send a heartbeat this often while connected
    pub heartbeat_interval_ms: Option<u64>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            server: None,
            stream_path: "/".to_string(),
            default_port: DEFAULT_SERVER_PORT,
            discovery: DiscoveryConfig::default(),
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL.as_millis() as u64,
            wifi_timeout_ms: DEFAULT_WIFI_TIMEOUT.as_millis() as u64,
            rediscover_after_ms: None,
            heartbeat_interval_ms: None,
        }
    }
}

impl TerminalConfig {
    /// Create a config for the given network with all other defaults.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            wifi: WifiConfig {
                ssid: ssid.into(),
                password: password.into(),
            },
            ..Default::default()
        }
    }

    /// Use a fixed server address instead of discovery.
    #[must_use]
    pub fn with_server(mut self, server: ServerEndpoint) -> Self {
        self.server = Some(server);
        self
    }

    #[must_use]
    pub fn with_rediscover_after(mut self, after: Duration) -> Self {
        self.rediscover_after_ms = Some(after.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi.ssid.is_empty() {
            return Err(ConfigError::Invalid("wifi.ssid is empty"));
        }
        if self.default_port == 0 {
            return Err(ConfigError::Invalid("default_port is zero"));
        }
        if self.server.map_or(false, |s| s.port == 0) {
            return Err(ConfigError::Invalid("server.port is zero"));
        }
        if self.discovery.port == 0 {
            return Err(ConfigError::Invalid("discovery.port is zero"));
        }
        if self.discovery.probe.is_empty() || self.discovery.response_prefix.is_empty() {
            return Err(ConfigError::Invalid("discovery tokens are empty"));
        }
        if self.discovery.interval_ms == 0 {
            return Err(ConfigError::Invalid("discovery.interval_ms is zero"));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::Invalid("reconnect_interval_ms is zero"));
        }
        if self.wifi_timeout_ms == 0 {
            return Err(ConfigError::Invalid("wifi_timeout_ms is zero"));
        }
        if self.rediscover_after_ms == Some(0) {
            return Err(ConfigError::Invalid("rediscover_after_ms is zero"));
        }
        if self.heartbeat_interval_ms == Some(0) {
            return Err(ConfigError::Invalid("heartbeat_interval_ms is zero"));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn wifi_timeout(&self) -> Duration {
        Duration::from_millis(self.wifi_timeout_ms)
    }

    pub fn rediscover_after(&self) -> Option<Duration> {
        self.rediscover_after_ms.map(Duration::from_millis)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_ms.map(Duration::from_millis)
    }
}

/// Config errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(reason) => write!(f, "Invalid config: {}", reason),
            Self::Invalid(reason) => write!(f, "Invalid config value: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
