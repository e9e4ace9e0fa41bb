//! Run configuration.
//!
//! # Environment Variables
//!
//! - `ARTICLES_BASE_URL`: articles API endpoint
//! - `ARTICLES_RPS`: sustained requests per second (float)
//! - `ARTICLES_BURST`: burst allowance
//! - `ARTICLES_WORKERS`: number of concurrent fetchers
//!
//! The limit has no environment override; it is a required CLI input.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{ArticlesError, Result};
use crate::providers::http::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::rate_limiter::{RateLimiterConfig, DEFAULT_BURST, DEFAULT_REQUESTS_PER_SECOND};

/// Largest accepted number of ranked names.
pub const MAX_LIMIT: usize = 100;

/// Default channel buffer between pipeline stages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Configuration for one fetch-and-rank run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Number of names to return (1..=100).
    pub limit: usize,
    /// Articles API endpoint.
    pub base_url: String,
    /// Sustained upstream request rate.
    pub requests_per_second: f64,
    /// Upstream burst allowance.
    pub burst: usize,
    /// Size of the fetcher pool.
    pub workers: usize,
    /// Buffer size of the page-index and results channels.
    pub channel_capacity: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Two fetchers per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

impl PipelineConfig {
    /// Create a config with the given limit and defaults elsewhere.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Build from defaults overridden by `ARTICLES_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ARTICLES_BASE_URL") {
            config.base_url = url;
        }
        if let Some(rps) = env_parse::<f64>("ARTICLES_RPS")? {
            config.requests_per_second = rps;
        }
        if let Some(burst) = env_parse::<usize>("ARTICLES_BURST")? {
            config.burst = burst;
        }
        if let Some(workers) = env_parse::<usize>("ARTICLES_WORKERS")? {
            config.workers = workers;
        }

        Ok(config)
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the API endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the upstream request rate.
    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set the burst allowance.
    pub fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }

    /// Set the fetcher pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the channel buffer size.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Rate limiter settings derived from this config.
    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(self.requests_per_second, self.burst)
    }

    /// Check every value is usable. Errors are [`ArticlesError::ConfigError`].
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(ArticlesError::ConfigError(
                "please provide a limit of articles".to_string(),
            ));
        }
        if self.limit > MAX_LIMIT {
            return Err(ArticlesError::ConfigError(format!(
                "limit {} is out of range, max is {}",
                self.limit, MAX_LIMIT
            )));
        }
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(ArticlesError::ConfigError(format!(
                "requests per second must be positive, got {}",
                self.requests_per_second
            )));
        }
        if self.burst == 0 {
            return Err(ArticlesError::ConfigError(
                "burst must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ArticlesError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ArticlesError::ConfigError(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        if self.base_url.is_empty() {
            return Err(ArticlesError::ConfigError(
                "base url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ArticlesError::ConfigError(format!("invalid value for {}: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.requests_per_second, 10.0);
        assert_eq!(config.burst, 1);
        assert!(config.workers >= 2);
        assert_eq!(config.workers % 2, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new(5)
            .with_base_url("http://localhost:8080/api")
            .with_requests_per_second(2.5)
            .with_burst(3)
            .with_workers(4)
            .with_channel_capacity(1)
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.limit, 5);
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.rate_limiter(), RateLimiterConfig::new(2.5, 3));
        assert_eq!(config.workers, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(PipelineConfig::new(1).validate().is_ok());
        assert!(PipelineConfig::new(MAX_LIMIT).validate().is_ok());

        let err = PipelineConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, ArticlesError::ConfigError(_)));

        let err = PipelineConfig::new(MAX_LIMIT + 1).validate().unwrap_err();
        assert!(err.to_string().contains("max is 100"));
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let base = PipelineConfig::new(3);
        assert!(base.clone().with_requests_per_second(0.0).validate().is_err());
        assert!(base
            .clone()
            .with_requests_per_second(f64::NAN)
            .validate()
            .is_err());
        assert!(base.clone().with_burst(0).validate().is_err());
        assert!(base.clone().with_workers(0).validate().is_err());
        assert!(base.clone().with_channel_capacity(0).validate().is_err());
        assert!(base.with_base_url("").validate().is_err());
    }

    #[test]
    fn test_env_parse_missing_and_invalid() {
        assert!(env_parse::<usize>("ARTICLES_TEST_SURELY_UNSET")
            .unwrap()
            .is_none());

        std::env::set_var("ARTICLES_TEST_BAD_NUMBER", "ten");
        let err = env_parse::<usize>("ARTICLES_TEST_BAD_NUMBER").unwrap_err();
        assert!(matches!(err, ArticlesError::ConfigError(_)));
        std::env::remove_var("ARTICLES_TEST_BAD_NUMBER");
    }
}
