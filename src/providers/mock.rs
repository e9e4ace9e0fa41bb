//! Mock page source for testing.
//!
//! Serves pages from memory and records every requested page number, so
//! tests can assert on fetch order and on which pages were never fetched.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              MockPageSource                 │
//! ├─────────────────────────────────────────────┤
//! │  with_pages()     build 1..=N pages         │
//! │  with_page()      add / replace one page    │
//! │  with_failure()   page answers with status  │
//! │  with_delay()     cancellable latency       │
//! │  requested_pages() fetch log                │
//! └─────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ArticlesError, Result};
use crate::traits::{Article, PageResponse, PageSource};

/// Mock page source for testing.
#[derive(Debug, Clone, Default)]
pub struct MockPageSource {
    pages: HashMap<u32, PageResponse>,
    failures: HashMap<u32, u16>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<u32>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockPageSource {
    /// Create an empty mock. Every page answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock serving pages `1..=total_pages`, filled by `articles`.
    pub fn with_pages(total_pages: u32, articles: impl Fn(u32) -> Vec<Article>) -> Self {
        (1..=total_pages).fold(Self::new(), |mock, page| {
            mock.with_page(PageResponse::new(page, total_pages, articles(page)))
        })
    }

    /// Add or replace a page, keyed by its `page` field.
    pub fn with_page(mut self, response: PageResponse) -> Self {
        self.pages.insert(response.page, response);
        self
    }

    /// Make `page` answer with a non-success `status`.
    pub fn with_failure(mut self, page: u32, status: u16) -> Self {
        self.failures.insert(page, status);
        self
    }

    /// Delay each fetch. The delay is cut short by cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Pages requested so far, in request order.
    pub async fn requested_pages(&self) -> Vec<u32> {
        self.requests.lock().await.clone()
    }

    /// Number of fetches started.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_page(&self, page: u32, cancel: &CancellationToken) -> Result<PageResponse> {
        if cancel.is_cancelled() {
            return Err(ArticlesError::Cancelled);
        }

        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(page);

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ArticlesError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if let Some(&status) = self.failures.get(&page) {
            return Err(ArticlesError::ApiError { page, status });
        }

        self.pages
            .get(&page)
            .cloned()
            .ok_or(ArticlesError::ApiError { page, status: 404 })
    }
}
