use std::time::Duration;

use config::{Config, ConfigBuilder, File, builder::DefaultState};
use dotenv::dotenv;
use eyre::{Result, eyre};
use serde::{Deserialize, de::DeserializeOwned};

fn config_from_env() -> Result<AppConfig> {
    dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        );

    config_from_builder(builder)
}

fn config_from_builder(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig> {
    builder
        .build()?
        .try_deserialize()
        .map_err(eyre::Error::from)
}

pub trait LoadFromEnv: Sized + DeserializeOwned {
    fn load() -> Result<Self>;
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub indexer: Option<IndexerConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Chain RPC endpoints. WebSocket is preferred when both are set; HTTP is the
/// fallback transport.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RpcConfig {
    pub http_url: Option<String>,
    pub ws_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SyncConfig {
    /// First block to index when there is no usable checkpoint.
    #[serde(default)]
    pub start_block: u64,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Only index logs emitted by this contract. `None` indexes every log.
    pub address: Option<String>,
    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            max_block_range: default_max_block_range(),
            poll_interval_ms: default_poll_interval_ms(),
            address: None,
            retry_min_delay_ms: default_retry_min_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_min_delay(&self) -> Duration {
        Duration::from_millis(self.retry_min_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexerConfig {
    pub database: DatabaseConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl IndexerConfig {
    /// Rejects settings the indexer cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.rpc.http_url.is_none() && self.rpc.ws_url.is_none() {
            return Err(eyre!(
                "At least one of 'indexer.rpc.http_url' or 'indexer.rpc.ws_url' must be set."
            ));
        }
        if self.sync.max_block_range == 0 {
            return Err(eyre!("'indexer.sync.max_block_range' must be greater than 0."));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(eyre!("'indexer.sync.poll_interval_ms' must be greater than 0."));
        }
        if self.sync.retry_min_delay_ms > self.sync.retry_max_delay_ms {
            return Err(eyre!(
                "'indexer.sync.retry_min_delay_ms' ({}) exceeds 'indexer.sync.retry_max_delay_ms' ({}).",
                self.sync.retry_min_delay_ms,
                self.sync.retry_max_delay_ms
            ));
        }
        if self.rpc.request_timeout_ms == 0 {
            return Err(eyre!("'indexer.rpc.request_timeout_ms' must be greater than 0."));
        }
        Ok(())
    }
}

impl LoadFromEnv for IndexerConfig {
    fn load() -> Result<Self> {
        let cfg = config_from_env()?
            .indexer
            .ok_or_else(|| eyre!("Configuration for the 'indexer' service is missing."))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_block_range() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_retry_min_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}
