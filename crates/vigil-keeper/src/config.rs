use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use ncn_oracle::{pubkey_serde, DetectorConfig};
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::error::KeeperError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "VIGIL_KEEPER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "keeper.toml";

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Seconds between ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Root of the file-backed telemetry provider
    #[serde(default = "default_telemetry_dir")]
    pub telemetry_dir: PathBuf,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Anomaly detector thresholds
    #[serde(default)]
    pub detector: DetectorConfig,

    /// List of markets to keep in sync
    pub markets: Vec<MarketConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Yield,
    Uptime,
}

/// Configuration for individual market
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    /// Market name for logging
    pub name: String,

    pub kind: MarketKind,

    /// NCN whose telemetry drives this market
    #[serde(with = "pubkey_serde")]
    pub ncn: Pubkey,

    /// Matcher context account
    #[serde(with = "pubkey_serde")]
    pub context: Pubkey,

    /// Whether this market is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per operation, including the first
    pub max_attempts: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_telemetry_dir() -> PathBuf {
    PathBuf::from("telemetry")
}

fn default_enabled() -> bool {
    true
}

impl KeeperConfig {
    /// Load from the path in `VIGIL_KEEPER_CONFIG`, or `keeper.toml`.
    pub fn from_env() -> Result<Self, KeeperError> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    /// Load configuration from TOML file
    pub fn load(path: &str) -> Result<Self, KeeperError> {
        let content = fs::read_to_string(path).map_err(|source| KeeperError::ConfigIo {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, KeeperError> {
        let config: KeeperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), KeeperError> {
        if self.markets.is_empty() {
            return Err(KeeperError::InvalidConfig("at least one market is required".into()));
        }

        if self.interval_secs == 0 {
            return Err(KeeperError::InvalidConfig("interval_secs must be greater than 0".into()));
        }

        for market in &self.markets {
            market.validate()?;
        }

        self.retry.validate()?;
        self.detector.validate()?;

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn enabled_markets(&self, kind: MarketKind) -> impl Iterator<Item = &MarketConfig> {
        self.markets.iter().filter(move |m| m.enabled && m.kind == kind)
    }
}

impl MarketConfig {
    fn validate(&self) -> Result<(), KeeperError> {
        if self.name.is_empty() {
            return Err(KeeperError::InvalidConfig("market name must not be empty".into()));
        }
        if self.context == Pubkey::default() {
            return Err(KeeperError::InvalidConfig(format!(
                "market {}: context account is the default pubkey",
                self.name
            )));
        }
        Ok(())
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), KeeperError> {
        if self.max_attempts == 0 {
            return Err(KeeperError::InvalidConfig("retry.max_attempts must be greater than 0".into()));
        }

        if self.base_delay_ms == 0 {
            return Err(KeeperError::InvalidConfig("retry.base_delay_ms must be greater than 0".into()));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(KeeperError::InvalidConfig(format!(
                "retry.max_delay_ms ({}) must be at least base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(KeeperError::InvalidConfig(format!(
                "retry.backoff_multiplier ({}) must be at least 1.0",
                self.backoff_multiplier
            )));
        }

        if self.timeout_ms == 0 {
            return Err(KeeperError::InvalidConfig("retry.timeout_ms must be greater than 0".into()));
        }

        Ok(())
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponent = attempt.min(i32::MAX as u32) as i32;
        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if exponential_delay >= self.max_delay_ms as f64 {
            return self.max_delay_ms;
        }
        exponential_delay as u64
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            timeout_ms: 5_000,
        }
    }
}
