//! Page source trait and wire types.
//!
//! A [`PageSource`] turns a 1-based page number into one decoded
//! [`PageResponse`]. Implementations:
//!
//! - [`crate::providers::HttpPageSource`] - the remote articles API
//! - [`crate::providers::MockPageSource`] - deterministic in-memory pages
//! - [`crate::rate_limiter::RateLimitedSource`] - throttling wrapper over any source

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::ranker::RankedEntry;

/// One article record as returned by the upstream API.
///
/// Every field may be missing or `null`; only `title`, `story_title` and
/// `num_comments` matter for ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub num_comments: Option<i64>,
    pub story_id: Option<i64>,
    pub story_title: Option<String>,
    pub story_url: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: Option<i64>,
}

impl Article {
    /// Create an article carrying only the fields used for ranking.
    pub fn new(
        title: Option<&str>,
        story_title: Option<&str>,
        num_comments: Option<i64>,
    ) -> Self {
        Self {
            title: title.map(str::to_string),
            story_title: story_title.map(str::to_string),
            num_comments,
            ..Default::default()
        }
    }

    /// Display name, preferring `title` over `story_title`.
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref().or(self.story_title.as_deref())
    }

    /// Apply the rankability filter.
    ///
    /// Returns `None` when the article has no display name, no comment
    /// count, or a negative comment count.
    pub fn ranked_entry(&self) -> Option<RankedEntry> {
        let name = self.display_name()?;
        let score = u64::try_from(self.num_comments?).ok()?;
        Some(RankedEntry::new(name, score))
    }
}

/// One decoded page of the paginated API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    pub page: u32,
    pub per_page: u32,
    pub total: u32,
    pub total_pages: u32,
    pub data: Vec<Article>,
}

impl PageResponse {
    /// Build a page with the given position and records.
    pub fn new(page: u32, total_pages: u32, data: Vec<Article>) -> Self {
        Self {
            page,
            per_page: data.len() as u32,
            total: 0,
            total_pages,
            data,
        }
    }
}

/// Source of paginated article data.
///
/// Implementations must honour `cancel`: once it fires, a pending call
/// returns [`crate::ArticlesError::Cancelled`] instead of completing.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Fetch and decode a single page. Pages are 1-based.
    async fn fetch_page(&self, page: u32, cancel: &CancellationToken) -> Result<PageResponse>;
}
