//! Application wiring.
//!
//! Builds the gateway stack for a validated [`PipelineConfig`]:
//!
//! ```text
//! PagePipeline ──► RateLimitedSource ──► HttpPageSource ──► articles API
//!                  (shared limiter)
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::PagePipeline;
use crate::providers::HttpPageSource;
use crate::rate_limiter::RateLimitedSource;
use crate::traits::PageSource;

/// One configured top-articles service.
pub struct App {
    config: PipelineConfig,
    pipeline: PagePipeline,
}

impl App {
    /// Validate `config` and wire the rate-limited HTTP source.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpPageSource::from_config(&config)?;
        let source = RateLimitedSource::new(http, config.rate_limiter());
        Self::with_source(config, Arc::new(source))
    }

    /// Validate `config` and run against an arbitrary page source.
    pub fn with_source(config: PipelineConfig, source: Arc<dyn PageSource>) -> Result<Self> {
        config.validate()?;
        let pipeline = PagePipeline::from_config(source, &config)?;
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one fetch-and-rank pass.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        info!(limit = self.config.limit, url = %self.config.base_url, "Running articles service");

        let result = self.pipeline.top_names(cancel).await;
        match &result {
            Ok(names) => info!(names = names.len(), "Articles service exited properly"),
            Err(e) if e.is_cancelled() => info!("Articles service cancelled"),
            Err(e) => error!(error = %e, "Articles service returning an error"),
        }
        result
    }
}
