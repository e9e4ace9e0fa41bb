//! Top Articles - rate-limited concurrent fetch and top-N ranking
//!
//! Pulls every page of a paginated articles API through a bounded pool of
//! fetchers and keeps only the `limit` most-commented articles in memory.
//!
//! # Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Bounded Ranker | [`ranker`] | Fixed-capacity min-heap, exact top-K |
//! | Fetch Gateway | [`providers`], [`rate_limiter`] | Page source behind one shared token bucket |
//! | Page Pipeline | [`pipeline`] | Bootstrap, fan-out, aggregation, cancellation |
//! | App | [`app`] | Config validation and wiring |
//!
//! # Example
//!
//! ```ignore
//! use top_articles::{App, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let app = App::new(PipelineConfig::new(10))?;
//! let names = app.run(&CancellationToken::new()).await?;
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod ranker;
pub mod rate_limiter;
pub mod traits;

pub use app::App;
pub use config::{PipelineConfig, MAX_LIMIT};
pub use error::{ArticlesError, ErrorKind, Result};
pub use pipeline::PagePipeline;
pub use providers::{HttpPageSource, MockPageSource};
pub use ranker::{BoundedRanker, RankedEntry};
pub use rate_limiter::{RateLimitedSource, RateLimiter, RateLimiterConfig};
pub use traits::{Article, PageResponse, PageSource};
