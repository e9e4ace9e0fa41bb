//! End-to-end pipeline tests against the in-memory page source.
//!
//! Run with: cargo test --test pipeline_e2e

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use top_articles::{
    App, Article, ArticlesError, ErrorKind, MockPageSource, PagePipeline, PageResponse,
    PipelineConfig, RateLimitedSource, RateLimiterConfig,
};

fn article(name: &str, comments: i64) -> Article {
    Article::new(Some(name), None, Some(comments))
}

/// Two pages: scores {5, 10, 7} then {2, 8}.
fn two_page_source() -> MockPageSource {
    MockPageSource::new()
        .with_page(PageResponse::new(
            1,
            2,
            vec![article("five", 5), article("ten", 10), article("seven", 7)],
        ))
        .with_page(PageResponse::new(
            2,
            2,
            vec![article("two", 2), article("eight", 8)],
        ))
}

#[tokio::test]
async fn test_two_pages_limit_three() {
    let mock = two_page_source();
    let pipeline = PagePipeline::new(Arc::new(mock.clone()), 3).unwrap();

    let names = pipeline.top_names(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["ten", "eight", "seven"]);
    assert_eq!(mock.requested_pages().await, vec![1, 2]);
}

#[tokio::test]
async fn test_limit_larger_than_dataset() {
    let pipeline = PagePipeline::new(Arc::new(two_page_source()), 100).unwrap();

    let names = pipeline.top_names(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["ten", "eight", "seven", "five", "two"]);
}

#[tokio::test]
async fn test_mixed_rankability_across_pages() {
    let mock = MockPageSource::new()
        .with_page(PageResponse::new(
            1,
            2,
            vec![
                Article::new(Some("A"), Some("B"), Some(5)),
                Article::new(None, None, Some(50)),
            ],
        ))
        .with_page(PageResponse::new(
            2,
            2,
            vec![
                Article::new(None, Some("B"), Some(6)),
                Article::new(Some("X"), None, None),
            ],
        ));
    let pipeline = PagePipeline::new(Arc::new(mock), 10).unwrap();

    let names = pipeline.top_names(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["B", "A"]);
}

#[tokio::test]
async fn test_many_pages_many_workers_exact_top_k() {
    // Page p holds scores 10p..10p+9, so the top 5 are all on page 40.
    let mock = MockPageSource::with_pages(40, |page| {
        (0..10)
            .map(|i| {
                let score = page as i64 * 10 + i;
                article(&score.to_string(), score)
            })
            .collect()
    });
    let pipeline = PagePipeline::new(Arc::new(mock.clone()), 5)
        .unwrap()
        .with_workers(6)
        .with_channel_capacity(2);

    let names = pipeline.top_names(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["409", "408", "407", "406", "405"]);

    let mut fetched = mock.requested_pages().await;
    fetched.sort_unstable();
    assert_eq!(fetched, (1..=40).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_non_bootstrap_failure_produces_no_output() {
    let mock = MockPageSource::with_pages(5, |page| vec![article("x", page as i64)])
        .with_failure(3, 502);
    let pipeline = PagePipeline::new(Arc::new(mock.clone()), 3)
        .unwrap()
        .with_workers(1);

    let err = pipeline
        .top_names(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArticlesError::ApiError { page: 3, status: 502 }));
    assert_eq!(err.kind(), ErrorKind::Fetch);
    // Pages 5 and 4 were fetched and aggregated before the failure.
    assert_eq!(mock.requested_pages().await, vec![1, 5, 4, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_bootstrap_completes() {
    let mock = two_page_source().with_delay(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    let pipeline = PagePipeline::new(Arc::new(mock.clone()), 3).unwrap();

    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.top_names(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancellation);
    assert_eq!(mock.requested_pages().await, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_pipeline() {
    let mock = MockPageSource::with_pages(6, |page| vec![article(&format!("p{}", page), page as i64)]);
    let source = RateLimitedSource::new(mock.clone(), RateLimiterConfig::new(10.0, 1));
    let pipeline = PagePipeline::new(Arc::new(source), 2)
        .unwrap()
        .with_workers(4);
    let started = tokio::time::Instant::now();

    let names = pipeline.top_names(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["p6", "p5"]);
    // Six requests at 10 rps with burst 1 need at least 500ms.
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(mock.call_count(), 6);
}

#[tokio::test]
async fn test_app_with_mock_source() {
    let config = PipelineConfig::new(3).with_workers(2);
    let app = App::with_source(config, Arc::new(two_page_source())).unwrap();

    let names = app.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(names, vec!["ten", "eight", "seven"]);
}
