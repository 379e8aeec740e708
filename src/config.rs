//! Configuration types for shield-client

use crate::error::{Error, Result};
use crate::types::ProtectionOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable that enables simulation mode (`true`/`1`/`yes`)
pub const ENV_MOCK_API: &str = "SHIELD_MOCK_API";
/// Environment variable holding the origin the client is served from
pub const ENV_ORIGIN: &str = "SHIELD_ORIGIN";
/// Environment variable overriding the processing service port
pub const ENV_API_PORT: &str = "SHIELD_API_PORT";
/// Environment variable overriding the real-mode poll interval, in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "SHIELD_POLL_INTERVAL_MS";
/// Environment variable overriding the HTTP request timeout, in milliseconds
pub const ENV_REQUEST_TIMEOUT_MS: &str = "SHIELD_REQUEST_TIMEOUT_MS";

/// Where the processing service lives and how it is polled
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Origin the client is served from (default: "http://localhost:8999")
    ///
    /// Only scheme, host and port are used; the API lives at `/api` on that origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Port of the processing service when it runs next to, not behind, the origin
    #[serde(default)]
    pub api_port: Option<u16>,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// Status poll cadence in real mode (default: 800ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub poll_interval: Duration,

    /// Give up tracking after this many consecutive failed status queries
    ///
    /// `None` (default) keeps polling through any number of transport errors. Zero is
    /// rejected by [`Config::validate`].
    #[serde(default)]
    pub max_consecutive_poll_errors: Option<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            api_port: None,
            request_timeout: default_request_timeout(),
            poll_interval: default_poll_interval(),
            max_consecutive_poll_errors: None,
        }
    }
}

impl ServiceConfig {
    /// Resolve the service base URL from the origin and the optional port override
    ///
    /// The result always ends in `/` with an empty path, so endpoint paths can be joined onto it.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.origin)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("unsupported scheme '{}' in origin", url.scheme()),
                ENV_ORIGIN,
            ));
        }
        if let Some(port) = self.api_port {
            url.set_port(Some(port))
                .map_err(|_| Error::config("origin cannot carry a port", ENV_API_PORT))?;
        }
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Client-side limits mirroring what the service advertises
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Maximum number of files in one batch (default: 50)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum size of a single file in bytes (default: 50 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Maximum total size of a batch in bytes (default: 200 MiB)
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            max_batch_bytes: default_max_batch_bytes(),
        }
    }
}

/// Offline simulation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Time between simulated status ticks (default: 200ms)
    #[serde(default = "default_tick", with = "duration_ms_serde")]
    pub tick: Duration,

    /// Progress added per tick, in percentage points (default: 5)
    #[serde(default = "default_increment")]
    pub increment: u8,

    /// Artificial delay before a simulated submission returns (default: 500ms)
    #[serde(default = "default_submit_delay", with = "duration_ms_serde")]
    pub submit_delay: Duration,

    /// Report `failed` once progress reaches this value (default: never)
    #[serde(default)]
    pub fail_at: Option<u8>,

    /// Message reported by an injected failure
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            increment: default_increment(),
            submit_delay: default_submit_delay(),
            fail_at: None,
            failure_message: default_failure_message(),
        }
    }
}

/// Main configuration for [`ShieldClient`](crate::ShieldClient)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Run against the offline simulation instead of the network service (default: false)
    #[serde(default)]
    pub simulate: bool,

    /// Processing service location and polling
    #[serde(default)]
    pub service: ServiceConfig,

    /// Client-side batch limits
    #[serde(default)]
    pub upload: UploadLimits,

    /// Offline simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Protection options sent with every batch
    #[serde(default)]
    pub protection: ProtectionOptions,
}

impl Config {
    /// Build a configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(value) = lookup(ENV_MOCK_API) {
            config.simulate = parse_flag(&value);
        }
        if let Some(origin) = lookup(ENV_ORIGIN) {
            config.service.origin = origin.trim().to_string();
        }
        if let Some(port) = lookup(ENV_API_PORT) {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::config(format!("invalid port '{port}': {e}"), ENV_API_PORT))?;
            config.service.api_port = Some(port);
        }
        if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
            config.service.poll_interval = parse_millis(&ms, ENV_POLL_INTERVAL_MS)?;
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.service.request_timeout = parse_millis(&ms, ENV_REQUEST_TIMEOUT_MS)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.service.base_url()?;

        if self.service.poll_interval.is_zero() {
            return Err(Error::config(
                "poll interval must be greater than zero",
                "service.poll_interval",
            ));
        }
        if self.service.max_consecutive_poll_errors == Some(0) {
            return Err(Error::config(
                "poll error limit must be at least 1 (leave unset to never give up)",
                "service.max_consecutive_poll_errors",
            ));
        }
        if self.simulation.tick.is_zero() {
            return Err(Error::config(
                "simulation tick must be greater than zero",
                "simulation.tick",
            ));
        }
        if self.simulation.increment == 0 || self.simulation.increment > 100 {
            return Err(Error::config(
                "simulation increment must be between 1 and 100",
                "simulation.increment",
            ));
        }
        if self.simulation.fail_at.is_some_and(|p| p > 100) {
            return Err(Error::config(
                "simulated failure point must be a percentage",
                "simulation.fail_at",
            ));
        }
        if self.upload.max_files == 0 {
            return Err(Error::config(
                "at least one file must be allowed per batch",
                "upload.max_files",
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_millis(value: &str, key: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::config(format!("invalid duration '{value}': {e}"), key))
}

fn default_origin() -> String {
    "http://localhost:8999".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(800)
}

fn default_max_files() -> usize {
    50
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_batch_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_tick() -> Duration {
    Duration::from_millis(200)
}

fn default_increment() -> u8 {
    5
}

fn default_submit_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_failure_message() -> String {
    "Simulated processing failure".to_string()
}

// Duration serialization helper (whole milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
