//! Fetch strategy escalation against live mock servers

use crate::common::{html, post_page, run, test_config, web_source};
use kb_harvester::config::FetchConfig;
use kb_harvester::crawler::{Fetcher, HostLimiter, Strategy};
use kb_harvester::FetchError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(min_text_chars: usize) -> Fetcher {
    fetcher_with_retries(min_text_chars, 2, 10)
}

fn fetcher_with_retries(min_text_chars: usize, retry_attempts: u32, retry_backoff_ms: u64) -> Fetcher {
    let config = FetchConfig {
        timeout_secs: 5,
        retry_attempts,
        retry_backoff_ms,
        min_text_chars,
        user_agent: "TestBot/1.0".to_string(),
        browser: false,
    };
    let limiter = Arc::new(HostLimiter::new(Duration::from_millis(1)));
    Fetcher::new(&config, limiter, None).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_block_then_success_escalates_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/guarded"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/guarded"))
        .respond_with(html(post_page("Guarded Post", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(vec![web_source(
        "guarded",
        format!("{}/blog/guarded", server.uri()),
        false,
    )]);
    let outcome = run(config).await;

    assert_eq!(outcome.document.items.len(), 1);
    assert_eq!(outcome.document.items[0].title, "Guarded Post");
    assert_eq!(outcome.summary.escalations, 1);
    assert_eq!(outcome.summary.pages_failed, 0);
}

#[tokio::test]
async fn test_rotated_headers_look_like_a_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_regex("user-agent", "^TestBot"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_regex("user-agent", "^Mozilla/5.0"))
        .and(header_regex("accept-language", "en"))
        .respond_with(html(post_page("Browser Only", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/page", server.uri())).unwrap();
    let outcome = fetcher(20).fetch_adaptive(&url, &CancellationToken::new()).await;

    let page = outcome.result.as_ref().expect("rotated headers should succeed");
    assert!(page.body.contains("Browser Only"));
    assert_eq!(outcome.escalations, 1);
    assert_eq!(outcome.final_strategy(), Some(Strategy::RotatedHeaders));
}

#[tokio::test]
async fn test_not_found_fails_without_escalating() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/gone", server.uri())).unwrap();
    let outcome = fetcher(20).fetch_adaptive(&url, &CancellationToken::new()).await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.escalations, 0);
}

#[tokio::test]
async fn test_server_error_retries_then_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html(post_page("Flaky", &[])))
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/flaky", server.uri())).unwrap();
    let outcome = fetcher(20).fetch_adaptive(&url, &CancellationToken::new()).await;

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.escalations, 0);
    assert_eq!(outcome.final_strategy(), Some(Strategy::PlainRequest));
}

#[tokio::test]
async fn test_thin_page_is_accepted_after_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/thin"))
        .respond_with(html(
            "<html><body><div id=\"root\">Loading</div></body></html>".to_string(),
        ))
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/thin", server.uri())).unwrap();
    let outcome = fetcher(500).fetch_adaptive(&url, &CancellationToken::new()).await;

    // No renderer: plain then rotated, then the best thin body is kept
    let page = outcome.result.expect("thin page accepted as last resort");
    assert!(page.body.contains("Loading"));
    assert_eq!(outcome.escalations, 1);
    assert_eq!(outcome.attempts.len(), 2);
}

#[tokio::test]
async fn test_repeated_failures_mark_page_failed_not_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(vec![web_source(
        "broken",
        format!("{}/blog/broken", server.uri()),
        false,
    )]);
    let outcome = run(config).await;

    assert!(!outcome.has_config_errors());
    assert!(outcome.document.items.is_empty());
    assert_eq!(outcome.summary.pages_failed, 1);
}

#[tokio::test]
async fn test_article_quoting_challenge_text_is_accepted() {
    let server = MockServer::start().await;
    let body = format!(
        "<html><body><article><h1>Living with bot walls</h1><p>{}</p>\
         <p>Visitors kept seeing \"Enable JavaScript and cookies to continue\" \
         above an empty challenge-form.</p></article></body></html>",
        "Interstitial pages are a common sight on large sites. ".repeat(15)
    );
    Mock::given(method("GET"))
        .and(path("/blog/bot-walls"))
        .respond_with(html(body))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/blog/bot-walls", server.uri())).unwrap();
    let outcome = fetcher(200).fetch_adaptive(&url, &CancellationToken::new()).await;

    let page = outcome.result.as_ref().expect("real article is not a challenge");
    assert!(page.body.contains("Living with bot walls"));
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.escalations, 0);
}

#[tokio::test]
async fn test_cancel_stops_retries_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/blog/unavailable", server.uri())).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = fetcher_with_retries(20, 4, 200).fetch_adaptive(&url, &cancel).await;

    assert_eq!(outcome.result.as_ref().unwrap_err(), &FetchError::Cancelled);
    assert_eq!(outcome.attempts.len(), 1);
    assert!(started.elapsed() < Duration::from_millis(190), "took {:?}", started.elapsed());
    let requests = server.received_requests().await.expect("request recording enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_sends_no_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(vec![web_source(
        "unavailable",
        format!("{}/blog/unavailable", server.uri()),
        false,
    )]);
    config.crawler.respect_robots = false;
    config.fetch.retry_attempts = 4;
    config.fetch.retry_backoff_ms = 200;

    let cancel = CancellationToken::new();
    let ctx = kb_harvester::run::RunContext::new(config, cancel.clone()).unwrap();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = kb_harvester::run::run_sources(&ctx).await;

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert!(outcome.document.items.is_empty());
    assert!(!outcome.has_config_errors());
    let requests = server.received_requests().await.expect("request recording enabled");
    assert!(requests.len() <= 2, "sent {} requests after cancel", requests.len());
}
