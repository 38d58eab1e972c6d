//! Application settings and configuration

use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::provider::binance::endpoints::MAX_ROWS_PER_REQUEST;
use crate::provider::binance::DEFAULT_REQUESTS_PER_MINUTE;
use crate::realtime::StreamKind;
use crate::schema::{Cadence, TimeRange};

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Exchange connection settings
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Include and exclude lists
    #[serde(default)]
    pub symbols: SymbolSettings,
    /// Base timeframe realtime bars are written under
    #[serde(default)]
    pub timeframe: Cadence,
    /// Historical backfill
    #[serde(default)]
    pub backfill: BackfillSettings,
    /// Realtime streaming
    #[serde(default)]
    pub realtime: RealtimeSettings,
    /// Sink selection
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Exchange connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// API key, sent only when non-empty
    #[serde(default)]
    pub api_key: String,
    /// Secret key; unused by the public endpoints
    #[serde(default)]
    pub secret_key: String,
    /// Use testnet endpoints
    #[serde(default)]
    pub testnet: bool,
    /// REST base URL override
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Stream base URL override
    #[serde(default)]
    pub stream_url: Option<String>,
    /// Request budget shared by all REST calls
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            testnet: false,
            rest_url: None,
            stream_url: None,
            requests_per_minute: default_requests_per_minute(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Symbol selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolSettings {
    /// Explicit symbols; empty means the whole tradable catalog
    #[serde(default)]
    pub include: Vec<String>,
    /// Symbols never ingested
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Historical backfill settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Range start, RFC 3339
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Range end, RFC 3339; defaults to now
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Bars per request
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Symbols backfilled concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Cadence of the fetched bars
    #[serde(default)]
    pub interval: Cadence,
    /// Pause between windows of one symbol
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,
}

fn default_batch_size() -> u32 {
    1000
}

fn default_parallelism() -> usize {
    5
}

fn default_inter_batch_delay() -> u64 {
    100
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: None,
            end_time: None,
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
            interval: Cadence::default(),
            inter_batch_delay_ms: default_inter_batch_delay(),
        }
    }
}

impl BackfillSettings {
    /// Range to backfill, end defaulting to now
    pub fn time_range(&self) -> Result<TimeRange, ConfigError> {
        let start = self
            .start_time
            .ok_or_else(|| ConfigError::Message("backfill.start_time is required".into()))?;
        let end = self.end_time.unwrap_or_else(Utc::now);

        if start >= end {
            return Err(ConfigError::Message(format!(
                "backfill.start_time ({}) must be before backfill.end_time ({})",
                start, end
            )));
        }

        Ok(TimeRange::new(start, end))
    }
}

/// Realtime streaming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Stream kinds; a single name or comma-separated list is accepted too
    #[serde(
        default = "default_stream_types",
        alias = "stream_type",
        deserialize_with = "one_or_many_stream_kinds"
    )]
    pub stream_types: Vec<StreamKind>,
    /// Kline stream cadence and aggregation key
    #[serde(default)]
    pub update_frequency: Cadence,
    /// Bars per aggregated flush
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Reserved for reconnection; not used yet
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Reserved for reconnection; not used yet
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Ping interval on stream connections
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

fn default_stream_types() -> Vec<StreamKind> {
    vec![StreamKind::Kline]
}

fn default_buffer_size() -> usize {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_keepalive_interval() -> u64 {
    30
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            stream_types: default_stream_types(),
            update_frequency: Cadence::default(),
            buffer_size: default_buffer_size(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            keepalive_interval_secs: default_keepalive_interval(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many_stream_kinds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<StreamKind>, D::Error> {
    let names = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s.split(',').map(str::to_string).collect(),
        OneOrMany::Many(v) => v,
    };

    let mut kinds = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let kind: StreamKind = name.parse().map_err(serde::de::Error::custom)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Kept in process memory
    Memory,
    /// JSON-lines files under `directory`
    #[default]
    Jsonl,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_storage_directory(),
        }
    }
}

impl Settings {
    /// Load settings from the config directory and `FEEDER__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("FEEDER")
    }

    /// Load settings with custom environment prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., FEEDER__BACKFILL__PARALLELISM)
            .add_source(Self::environment(env_prefix))
            .build()?;

        s.try_deserialize()
    }

    /// Load settings from one file, environment variables still applied on top
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .add_source(Self::environment("FEEDER"))
            .build()?
            .try_deserialize()
    }

    fn environment(env_prefix: &str) -> Environment {
        Environment::with_prefix(env_prefix)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("symbols.include")
            .with_list_parse_key("symbols.exclude")
            .try_parsing(true)
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("FEEDER_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Check cross-field constraints and fill derived defaults
    ///
    /// Cadence codes are already checked while deserializing.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.backfill.enabled {
            let range = self.backfill.time_range()?;
            self.backfill.end_time = Some(range.end);

            if self.backfill.parallelism == 0 {
                return Err(ConfigError::Message(
                    "backfill.parallelism must be greater than 0".into(),
                ));
            }
            if self.backfill.batch_size == 0 {
                return Err(ConfigError::Message(
                    "backfill.batch_size must be greater than 0".into(),
                ));
            }
            if self.backfill.batch_size > MAX_ROWS_PER_REQUEST {
                warn!(
                    "backfill.batch_size {} exceeds the exchange limit, using {}",
                    self.backfill.batch_size, MAX_ROWS_PER_REQUEST
                );
                self.backfill.batch_size = MAX_ROWS_PER_REQUEST;
            }
        }

        if self.realtime.enabled {
            if self.realtime.stream_types.is_empty() {
                return Err(ConfigError::Message(
                    "realtime.stream_types must name at least one of kline, trade, depth".into(),
                ));
            }
            if self.realtime.buffer_size == 0 {
                return Err(ConfigError::Message(
                    "realtime.buffer_size must be greater than 0".into(),
                ));
            }
        }

        Ok(())
    }
}
