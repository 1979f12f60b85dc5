//! Serializable scan configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use pricespan_core::data::{HttpSettings, RetryPolicy};
use pricespan_core::domain::{Market, DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};

/// Upper bound on the worker pool, whatever the configuration says.
pub const MAX_WORKERS: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything one scan needs besides the providers themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Market segments scanned, in order.
    pub markets: Vec<Market>,

    /// Trailing window in calendar days.
    pub lookback_days: u32,

    /// Worker pool size. `None` sizes from the CPU count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Circuit breaker cooldown in seconds.
    pub breaker_cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// File name prefix: `{prefix}_{market}_{YYYYMMDD}.csv`.
    pub file_prefix: String,
    /// Append the `ratio_pct` column (current / period high × 100).
    pub include_ratio: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            markets: vec![Market::AShare],
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            workers: None,
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let settings = HttpSettings::default();
        Self {
            timeout_secs: settings.timeout.as_secs(),
            breaker_cooldown_secs: settings.breaker_cooldown.as_secs(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            file_prefix: "price_extrema".into(),
            include_ratio: true,
        }
    }
}

impl ScanConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text; missing fields take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the scan cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markets.is_empty() {
            return Err(ConfigError::Invalid("markets must not be empty".into()));
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid("lookback_days must be at least 1".into()));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            )));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be at least 1".into()));
        }
        if self.report.file_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("report.file_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Resolved pool size, always within `[1, MAX_WORKERS]`.
    ///
    /// Without an explicit value: `min(32, cpus + 4)`, the usual sizing for
    /// I/O-bound pools.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| (num_cpus::get() + 4).min(32))
            .clamp(1, MAX_WORKERS)
    }

    /// Per-symbol retry schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: self.retry.jitter,
        }
    }

    /// Timeout and breaker cooldown for the HTTP clients.
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.http.timeout_secs),
            breaker_cooldown: Duration::from_secs(self.http.breaker_cooldown_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScanConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lookback_days, 730);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.report.include_ratio);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = ScanConfig::default();
        config.markets = vec![Market::AShare, Market::HShare];
        config.workers = Some(8);
        let text = config.to_toml().unwrap();
        let parsed = ScanConfig::from_toml(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ScanConfig::from_toml(
            r#"
            markets = ["h_share"]
            workers = 4

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.markets, vec![Market::HShare]);
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn rejects_zero_workers_and_attempts() {
        assert!(ScanConfig::from_toml("workers = 0").is_err());
        assert!(ScanConfig::from_toml("[retry]\nmax_attempts = 0").is_err());
        assert!(ScanConfig::from_toml("markets = []").is_err());
    }

    #[test]
    fn rejects_oversized_lookback() {
        let mut config = ScanConfig::default();
        config.lookback_days = 200_000_000;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("lookback_days")));

        config.lookback_days = MAX_LOOKBACK_DAYS;
        config.validate().unwrap();

        assert!(ScanConfig::from_toml("lookback_days = 36501").is_err());
    }

    #[test]
    fn worker_count_is_bounded() {
        let mut config = ScanConfig::default();
        let auto = config.worker_count();
        assert!((1..=32).contains(&auto));

        config.workers = Some(10_000);
        assert_eq!(config.worker_count(), MAX_WORKERS);
    }
}
