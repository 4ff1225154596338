//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Content lifecycle configuration.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Payment collaborator configuration.
    pub payments: PaymentsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
    /// Whether realtime change events are published.
    #[serde(default = "default_true")]
    pub publish_events: bool,
}

/// Which sub-conditions complete an active need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedCompletionRule {
    /// Every activity on the checklist is completed.
    Activities,
    /// The funding goal is fully met.
    Funding,
    /// Either of the above.
    #[default]
    Either,
    /// Both of the above.
    Both,
}

/// Content lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Completion rule for needs.
    #[serde(default)]
    pub need_completion: NeedCompletionRule,
    /// Minimum number of votes before a poll can be approved.
    #[serde(default = "default_approval_min_votes")]
    pub approval_min_votes: u32,
    /// Seconds between lifecycle sweeps (0 disables the sweeper).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum number of items advanced per sweep.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            need_completion: NeedCompletionRule::default(),
            approval_min_votes: default_approval_min_votes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

/// Payment collaborator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Shared secret the payment collaborator sends in `X-Payment-Secret`.
    pub webhook_secret: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "agora".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_approval_min_votes() -> u32 {
    1
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_sweep_batch_size() -> u64 {
    100
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `AGORA_ENV`)
    /// 3. Environment variables with `AGORA_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("AGORA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("AGORA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("AGORA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    /// Reject settings that deserialize but cannot be run with.
    pub fn validated(self) -> Result<Self, config::ConfigError> {
        if self.payments.webhook_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "payments.webhook_secret must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}
