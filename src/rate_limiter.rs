//! Async-aware rate limiting for upstream page fetches.
//!
//! The articles API throttles (and may ban) clients per IP address, so every
//! request of a run draws from one shared token bucket. The bucket refills at
//! `requests_per_second` and holds at most `burst` tokens; with the defaults
//! (10 rps, burst 1) requests leave evenly spaced, one every 100ms.
//!
//! Waiting for a token is cancellable: when the run's token fires the waiter
//! returns [`ArticlesError::Cancelled`] instead of issuing the request.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ArticlesError, Result};
use crate::traits::{PageResponse, PageSource};

/// Default maximum requests per second against the upstream host.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;

/// Default burst allowance.
pub const DEFAULT_BURST: usize = 1;

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Sustained requests per second.
    pub requests_per_second: f64,
    /// Maximum number of requests that may be issued back to back.
    pub burst: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new config with specified limits.
    pub fn new(requests_per_second: f64, burst: usize) -> Self {
        Self {
            requests_per_second,
            burst,
        }
    }

    /// Set burst allowance.
    pub fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }
}

/// Token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, tokens: f64) -> bool {
        self.refill();
        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    fn time_to_acquire(&mut self, tokens: f64) -> Duration {
        self.refill();
        if self.tokens >= tokens {
            Duration::ZERO
        } else {
            // Floor at 1ms so float rounding never yields a zero-length sleep.
            let needed = tokens - self.tokens;
            Duration::try_from_secs_f64(needed / self.refill_rate)
                .unwrap_or(Duration::MAX)
                .max(Duration::from_millis(1))
        }
    }

    fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}

/// Process-wide request limiter shared by every fetcher of a run.
pub struct RateLimiter {
    config: RateLimiterConfig,
    request_bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimiterConfig) -> Self {
        let max_tokens = config.burst.max(1) as f64;
        let refill_rate = config.requests_per_second.max(f64::MIN_POSITIVE);

        Self {
            request_bucket: Mutex::new(TokenBucket::new(max_tokens, refill_rate)),
            config,
        }
    }

    /// Create with default configuration.
    pub fn default_limiter() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Wait until one request may be issued.
    ///
    /// Returns [`ArticlesError::Cancelled`] as soon as `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(ArticlesError::Cancelled);
            }

            let wait_time = {
                let mut bucket = self.request_bucket.lock().await;
                if bucket.try_acquire(1.0) {
                    return Ok(());
                }
                bucket.time_to_acquire(1.0)
            };

            debug!(
                wait_ms = wait_time.as_millis(),
                "Rate limited: waiting for request slot"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ArticlesError::Cancelled),
                _ = tokio::time::sleep(wait_time) => {}
            }
        }
    }

    /// Take a token without waiting. Returns `false` if none is available.
    pub async fn try_acquire(&self) -> bool {
        self.request_bucket.lock().await.try_acquire(1.0)
    }

    /// Get current available request capacity.
    pub async fn available(&self) -> f64 {
        self.request_bucket.lock().await.available()
    }

    /// Get the configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

/// Rate-limited page source wrapper.
pub struct RateLimitedSource<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> RateLimitedSource<S> {
    /// Create a new rate-limited wrapper with its own limiter.
    pub fn new(source: S, config: RateLimiterConfig) -> Self {
        Self {
            inner: source,
            limiter: Arc::new(RateLimiter::new(config)),
        }
    }

    /// Create with a shared rate limiter.
    pub fn with_limiter(source: S, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner: source,
            limiter,
        }
    }

    /// Get a reference to the inner source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a reference to the rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl<S: PageSource> PageSource for RateLimitedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_page(&self, page: u32, cancel: &CancellationToken) -> Result<PageResponse> {
        self.limiter.acquire(cancel).await?;
        self.inner.fetch_page(page, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockPageSource;

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket() {
        let mut bucket = TokenBucket::new(2.0, 1.0);

        assert!(bucket.try_acquire(1.0));
        assert!(bucket.try_acquire(1.0));
        assert!(!bucket.try_acquire(1.0)); // Bucket empty
        assert_eq!(bucket.time_to_acquire(1.0), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(bucket.try_acquire(1.0));
        assert!(bucket.available() >= 0.99);
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let limiter = RateLimiter::default_limiter();

        assert_eq!(limiter.config().requests_per_second, 10.0);
        assert_eq!(limiter.config().burst, 1);
        assert!(limiter.available().await > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spaces_requests() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(10.0, 1));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }

        // First token is immediate, the next two wait 100ms each.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_allows_back_to_back() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1.0, 3));

        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_cancelled_while_waiting() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(0.1, 1)));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ArticlesError::Cancelled)));
    }

    #[tokio::test]
    async fn test_acquire_already_cancelled() {
        let limiter = RateLimiter::default_limiter();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(limiter.acquire(&cancel).await.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_source_shares_limiter() {
        let mock = MockPageSource::with_pages(3, |_| Vec::new());
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(10.0, 1)));
        let source = RateLimitedSource::with_limiter(mock.clone(), Arc::clone(&limiter));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for page in 1..=3 {
            source.fetch_page(page, &cancel).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(mock.requested_pages().await, vec![1, 2, 3]);
        assert!(Arc::ptr_eq(source.limiter(), &limiter));
    }

    #[tokio::test]
    async fn test_rate_limited_source_skips_fetch_when_cancelled() {
        let mock = MockPageSource::with_pages(1, |_| Vec::new());
        let source = RateLimitedSource::new(mock.clone(), RateLimiterConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = source.fetch_page(1, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(mock.requested_pages().await.is_empty());
        assert_eq!(source.name(), "mock");
    }
}
