//! Concurrent fetch-and-rank pipeline.
//!
//! # Architecture
//!
//! ```ascii
//!   bootstrap: fetch page 1 ──────────────────────────────┐
//!                                                         │ batch
//!   ┌──────────┐  pages N..2  ┌──────────────────┐ batches ▼  ┌────────────┐
//!   │ producer │ ───────────► │ fetcher pool (W) │ ─────────► │ aggregator │ ──► BoundedRanker
//!   └──────────┘   bounded    └──────────────────┘  bounded   └────────────┘
//!                                     │
//!                                     ▼
//!                            PageSource (rate limited)
//! ```
//!
//! Page 1 is fetched before any task is spawned and tells the pipeline how
//! many pages exist. Its records go straight to the aggregator. The producer
//! enqueues pages from `total_pages` down to 2, so a single fetcher sees a
//! deterministic descending order.
//!
//! # Shutdown
//!
//! All tasks share one child [`CancellationToken`]. The first fetch error is
//! recorded and cancels the token; every channel send/receive and every
//! limiter wait also watches the token, so nothing stays blocked. The run
//! then returns that first error, or [`ArticlesError::Cancelled`] if the
//! caller's token fired. Partial rankings are never returned.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{default_workers, PipelineConfig, DEFAULT_CHANNEL_CAPACITY};
use crate::error::{ArticlesError, Result};
use crate::ranker::BoundedRanker;
use crate::traits::{Article, PageSource};

type PageQueue = Arc<Mutex<mpsc::Receiver<u32>>>;

/// Orchestrates one top-N run over a paginated [`PageSource`].
pub struct PagePipeline {
    source: Arc<dyn PageSource>,
    limit: usize,
    workers: usize,
    channel_capacity: usize,
}

impl PagePipeline {
    /// Create a pipeline returning at most `limit` names.
    pub fn new(source: Arc<dyn PageSource>, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ArticlesError::ConfigError(
                "limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            source,
            limit,
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        })
    }

    /// Create a pipeline using the limit and pool sizing from `config`.
    pub fn from_config(source: Arc<dyn PageSource>, config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(source, config.limit)?
            .with_workers(config.workers)
            .with_channel_capacity(config.channel_capacity))
    }

    /// Set the fetcher pool size (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the buffer size of both channels (at least 1).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every page and return the names of the top `limit` articles,
    /// highest comment count first.
    ///
    /// Fails with the first fetch error, or with
    /// [`ArticlesError::Cancelled`] if `cancel` fires before completion.
    pub async fn top_names(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let started = Instant::now();
        let ranker = Arc::new(BoundedRanker::new(self.limit)?);
        let token = cancel.child_token();

        info!(
            source = self.source.name(),
            limit = self.limit,
            workers = self.workers,
            "Starting page pipeline"
        );

        let outcome = self.run(&token, Arc::clone(&ranker)).await;
        token.cancel();
        outcome?;

        let names = ranker.drain_sorted_names_desc();
        info!(
            names = names.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Page pipeline finished"
        );
        Ok(names)
    }

    async fn run(&self, token: &CancellationToken, ranker: Arc<BoundedRanker>) -> Result<()> {
        let first = self.source.fetch_page(1, token).await.map_err(|e| {
            error!(page = 1, error = %e, "Bootstrap fetch failed");
            e
        })?;
        let total_pages = first.total_pages;
        info!(total_pages, "Fetched first page");

        let failure = Arc::new(FirstError::new(token.clone()));
        let (results_tx, results_rx) = mpsc::channel::<Vec<Article>>(self.channel_capacity);
        let (pages_tx, pages_rx) = mpsc::channel::<u32>(self.channel_capacity);

        let aggregator = tokio::spawn(aggregate(results_rx, ranker, token.clone()));
        send_batch(&results_tx, first.data, token).await;

        let producer = tokio::spawn(produce_pages(pages_tx, total_pages, token.clone()));

        let mut fetchers = JoinSet::new();
        if total_pages > 1 {
            debug!(workers = self.workers, "Starting fetcher pool");
            let queue: PageQueue = Arc::new(Mutex::new(pages_rx));
            for worker in 0..self.workers {
                fetchers.spawn(fetch_pages(
                    worker,
                    Arc::clone(&self.source),
                    Arc::clone(&queue),
                    results_tx.clone(),
                    Arc::clone(&failure),
                    token.clone(),
                ));
            }
        }
        // The aggregator sees end-of-stream once the last fetcher drops its sender.
        drop(results_tx);

        while let Some(joined) = fetchers.join_next().await {
            if let Err(e) = joined {
                failure.record(e.into());
            }
        }
        debug!("Fetcher pool stopped");

        if let Err(e) = producer.await {
            failure.record(e.into());
        }
        if let Err(e) = aggregator.await {
            failure.record(e.into());
        }

        if let Some(err) = failure.take() {
            return Err(err);
        }
        if token.is_cancelled() {
            return Err(ArticlesError::Cancelled);
        }
        Ok(())
    }
}

/// First-error slot shared by the pipeline's tasks.
///
/// Recording an error cancels the run; later errors are dropped.
struct FirstError {
    slot: parking_lot::Mutex<Option<ArticlesError>>,
    token: CancellationToken,
}

impl FirstError {
    fn new(token: CancellationToken) -> Self {
        Self {
            slot: parking_lot::Mutex::new(None),
            token,
        }
    }

    fn record(&self, err: ArticlesError) {
        {
            let mut slot = self.slot.lock();
            if slot.is_none() {
                error!(error = %err, "Pipeline task failed, cancelling run");
                *slot = Some(err);
            }
        }
        self.token.cancel();
    }

    fn take(&self) -> Option<ArticlesError> {
        self.slot.lock().take()
    }
}

/// Push a batch to the aggregator. Returns `false` if the run is over.
async fn send_batch(
    results: &mpsc::Sender<Vec<Article>>,
    batch: Vec<Article>,
    token: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = results.send(batch) => sent.is_ok(),
    }
}

async fn produce_pages(pages: mpsc::Sender<u32>, total_pages: u32, token: CancellationToken) {
    for page in (2..=total_pages).rev() {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            sent = pages.send(page) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn next_page(queue: &PageQueue) -> Option<u32> {
    queue.lock().await.recv().await
}

async fn fetch_pages(
    worker: usize,
    source: Arc<dyn PageSource>,
    queue: PageQueue,
    results: mpsc::Sender<Vec<Article>>,
    failure: Arc<FirstError>,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            page = next_page(&queue) => page,
        };
        let Some(page) = next else {
            break;
        };

        match source.fetch_page(page, &token).await {
            Ok(response) => {
                if !send_batch(&results, response.data, &token).await {
                    break;
                }
            }
            Err(err) if err.is_cancelled() && token.is_cancelled() => break,
            Err(err) => {
                error!(worker, page, error = %err, "Page fetch failed");
                failure.record(err);
                break;
            }
        }
    }
    debug!(worker, "Fetcher stopped");
}

async fn aggregate(
    mut batches: mpsc::Receiver<Vec<Article>>,
    ranker: Arc<BoundedRanker>,
    token: CancellationToken,
) {
    let mut ranked = 0usize;
    let mut dropped = 0usize;

    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            batch = batches.recv() => batch,
        };
        let Some(articles) = batch else {
            break;
        };

        for article in &articles {
            match article.ranked_entry() {
                Some(entry) => {
                    ranker.insert(entry);
                    ranked += 1;
                }
                None => dropped += 1,
            }
        }
    }
    debug!(ranked, dropped, "Aggregator stopped");
}
