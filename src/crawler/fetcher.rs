//! HTTP fetcher implementation
//!
//! This module executes fetch strategies:
//! - Building the plain and browser-posing HTTP clients
//! - Issuing one attempt per strategy, behind the per-host politeness gate
//! - Driving the per-URL [`StrategySelector`] until a page is accepted or
//!   every strategy is exhausted

use crate::config::FetchConfig;
use crate::crawler::politeness::HostLimiter;
use crate::crawler::render::PageRenderer;
use crate::crawler::strategy::{
    classify_response, Decision, FetchAttempt, FetchStatus, FetchedPage, RetryPolicy, Strategy,
    StrategySelector,
};
use crate::url::host_key;
use crate::FetchError;
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Desktop browser user agents used by the rotated-headers strategy
const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Result of driving the whole strategy chain for one URL
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<FetchedPage, FetchError>,
    /// Every attempt made, in order
    pub attempts: Vec<FetchAttempt>,
    pub escalations: u32,
}

impl FetchOutcome {
    /// Strategy of the last attempt
    pub fn final_strategy(&self) -> Option<Strategy> {
        self.attempts.last().map(|a| a.strategy)
    }
}

/// Builds the HTTP client used by the plain strategy
///
/// Redirects are followed by reqwest (up to 10 hops); the crawler inspects
/// the final URL afterwards.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the client for the rotated-headers strategy
///
/// No default user agent: every request picks one from the pool.
fn build_browser_like_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
    );
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Picks a browser user agent at random
pub fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Executes fetch strategies for the crawler
pub struct Fetcher {
    plain: Client,
    rotated: Client,
    renderer: Option<Arc<dyn PageRenderer>>,
    limiter: Arc<HostLimiter>,
    policy: RetryPolicy,
    min_text_chars: usize,
    user_agent: String,
}

impl Fetcher {
    /// Creates a fetcher from the fetch settings
    ///
    /// # Arguments
    ///
    /// * `config` - Fetch configuration
    /// * `limiter` - Per-host politeness gate shared by the run
    /// * `renderer` - Optional browser capability; enables the third strategy
    pub fn new(
        config: &FetchConfig,
        limiter: Arc<HostLimiter>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            plain: build_http_client(config)?,
            rotated: build_browser_like_client(config)?,
            policy: RetryPolicy {
                attempts: config.retry_attempts.max(1),
                backoff: Duration::from_millis(config.retry_backoff_ms),
                browser_available: renderer.is_some(),
            },
            renderer,
            limiter,
            min_text_chars: config.min_text_chars,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn limiter(&self) -> &HostLimiter {
        &self.limiter
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Runs the strategy chain for one URL until a page is accepted or the
    /// chain is exhausted
    ///
    /// Once `cancel` fires no further attempt is started: politeness waits
    /// and retry backoff are cut short and the outcome is
    /// [`FetchError::Cancelled`]. An attempt already on the wire finishes.
    pub async fn fetch_adaptive(&self, url: &Url, cancel: &CancellationToken) -> FetchOutcome {
        let mut selector = StrategySelector::new(self.policy);
        let mut attempts = Vec::new();
        let mut escalations = 0;

        loop {
            if !self.wait_turn_or_cancel(url, cancel).await {
                tracing::debug!("Fetch of {} cancelled after {} attempts", url, attempts.len());
                return FetchOutcome {
                    result: Err(FetchError::Cancelled),
                    attempts,
                    escalations,
                };
            }

            let attempt = self.attempt_now(url, selector.current()).await;
            let status = attempt.status.clone();
            tracing::debug!(
                "{} via {} took {:?}",
                url,
                attempt.strategy,
                attempt.elapsed
            );
            attempts.push(attempt);

            match selector.observe(status) {
                Decision::Accept(page) => {
                    return FetchOutcome {
                        result: Ok(page),
                        attempts,
                        escalations,
                    }
                }
                Decision::Retry { strategy, delay } => {
                    tracing::debug!("Retrying {} via {} in {:?}", url, strategy, delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
                Decision::Escalate { from, to, reason } => {
                    escalations += 1;
                    tracing::info!("Escalating {} from {} to {}: {}", url, from, to, reason);
                }
                Decision::GiveUp(error) => {
                    return FetchOutcome {
                        result: Err(error),
                        attempts,
                        escalations,
                    }
                }
            }
        }
    }

    /// Waits for the host's politeness slot; false if cancelled first
    async fn wait_turn_or_cancel(&self, url: &Url, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let Some(host) = host_key(url) else {
            return true;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.limiter.wait_turn(&host) => true,
        }
    }

    /// Applies one strategy to one URL
    pub async fn attempt(&self, url: &Url, strategy: Strategy) -> FetchAttempt {
        if let Some(host) = host_key(url) {
            self.limiter.wait_turn(&host).await;
        }
        self.attempt_now(url, strategy).await
    }

    /// Applies one strategy without waiting on politeness
    async fn attempt_now(&self, url: &Url, strategy: Strategy) -> FetchAttempt {
        let start = Instant::now();
        let status = match strategy {
            Strategy::PlainRequest => self.http_attempt(&self.plain, url, None).await,
            Strategy::RotatedHeaders => {
                self.http_attempt(&self.rotated, url, Some(random_user_agent()))
                    .await
            }
            Strategy::BrowserRender => self.render_attempt(url).await,
        };

        FetchAttempt {
            url: url.clone(),
            strategy,
            status,
            elapsed: start.elapsed(),
        }
    }

    async fn http_attempt(
        &self,
        client: &Client,
        url: &Url,
        user_agent: Option<&str>,
    ) -> FetchStatus {
        let mut request = client.get(url.clone());
        if let Some(ua) = user_agent {
            request = request.header(USER_AGENT, ua);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return hard_fail(e.into()),
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        match response.text().await {
            Ok(body) => {
                classify_response(final_url, status, &content_type, body, self.min_text_chars)
            }
            Err(e) => hard_fail(e.into()),
        }
    }

    async fn render_attempt(&self, url: &Url) -> FetchStatus {
        let Some(renderer) = &self.renderer else {
            return FetchStatus::HardFail {
                error: FetchError::Render("no browser renderer configured".to_string()),
                retryable: false,
            };
        };

        match renderer.render(url).await {
            // The rendered DOM is what a reader sees, so it is judged by the
            // same content rules as an HTTP body
            Ok(html) => classify_response(url.clone(), 200, "text/html", html, self.min_text_chars),
            Err(error) => FetchStatus::HardFail {
                retryable: matches!(error, FetchError::Timeout),
                error,
            },
        }
    }

    /// Fetches a plain-text resource such as robots.txt or a sitemap
    ///
    /// # Returns
    ///
    /// * `Ok(Some(body))` - 2xx response
    /// * `Ok(None)` - 4xx response; the resource does not exist
    /// * `Err(FetchError)` - network failure or 5xx
    pub async fn fetch_text(&self, url: &Url) -> Result<Option<String>, FetchError> {
        if let Some(host) = host_key(url) {
            self.limiter.wait_turn(&host).await;
        }

        let response = self.plain.get(url.clone()).send().await?;
        let status = response.status();

        if status.is_client_error() {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        Ok(Some(response.text().await?))
    }
}

fn hard_fail(error: FetchError) -> FetchStatus {
    let retryable = matches!(error, FetchError::Timeout | FetchError::Connect(_) | FetchError::Body(_));
    FetchStatus::HardFail { error, retryable }
}
