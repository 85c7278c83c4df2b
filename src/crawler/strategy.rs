//! Fetch strategy escalation
//!
//! Each URL walks a cost-ascending chain of strategies:
//!
//! | Strategy | Cost |
//! |----------|------|
//! | `PlainRequest` | one HTTP request with the crawler's own user agent |
//! | `RotatedHeaders` | one HTTP request posing as a desktop browser |
//! | `BrowserRender` | headless browser page lifecycle (optional capability) |
//!
//! The chain is reset per URL. A soft block (403/429, challenge page, thin
//! body) escalates immediately; a hard failure (network error, timeout, 5xx)
//! is retried with backoff at the same strategy before escalating.

use crate::FetchError;
use scraper::Html;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Markers of interstitial anti-bot challenge pages
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-chl-",
    "/cdn-cgi/challenge-platform/",
    "<title>Just a moment...</title>",
    "challenge-form",
    "Enable JavaScript and cookies to continue",
];

/// Elements whose text never renders
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// One rung of the escalation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    PlainRequest,
    RotatedHeaders,
    BrowserRender,
}

impl Strategy {
    /// Returns the next, more expensive strategy
    ///
    /// `BrowserRender` is only reachable when a renderer is configured.
    pub fn next(self, browser_available: bool) -> Option<Strategy> {
        match self {
            Self::PlainRequest => Some(Self::RotatedHeaders),
            Self::RotatedHeaders if browser_available => Some(Self::BrowserRender),
            Self::RotatedHeaders | Self::BrowserRender => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainRequest => "plain_request",
            Self::RotatedHeaders => "rotated_headers",
            Self::BrowserRender => "browser_render",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A page body that was retrieved successfully at the transport level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub content_type: String,
    pub body: String,
}

/// Why a response was judged a soft block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Blocking status code (403, 429)
    Status(u16),
    /// Fewer visible text characters than the content threshold
    Thin { chars: usize },
    /// Interstitial challenge page
    Challenge,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Thin { chars } => write!(f, "thin body ({} visible chars)", chars),
            Self::Challenge => write!(f, "challenge page"),
        }
    }
}

/// Classified outcome of one attempt
#[derive(Debug, Clone)]
pub enum FetchStatus {
    Success(FetchedPage),

    /// The site pushed back; a different strategy may get through.
    /// A thin page is kept as a fallback in case nothing does better.
    SoftBlock {
        reason: BlockReason,
        page: Option<FetchedPage>,
    },

    HardFail {
        error: FetchError,
        retryable: bool,
    },
}

/// Record of one strategy applied to one URL
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub url: Url,
    pub strategy: Strategy,
    pub status: FetchStatus,
    pub elapsed: Duration,
}

/// Classifies an HTTP response into a fetch status
///
/// Pure function of the response; no I/O.
pub fn classify_response(
    final_url: Url,
    status: u16,
    content_type: &str,
    body: String,
    min_text_chars: usize,
) -> FetchStatus {
    if status == 403 || status == 429 {
        return FetchStatus::SoftBlock {
            reason: BlockReason::Status(status),
            page: None,
        };
    }

    let success = (200..=299).contains(&status);
    if !success && is_challenge(&body) {
        return FetchStatus::SoftBlock {
            reason: BlockReason::Challenge,
            page: None,
        };
    }

    match status {
        200..=299 => {}
        404 | 410 => {
            return FetchStatus::HardFail {
                error: FetchError::Http { status },
                retryable: false,
            }
        }
        408 | 500..=599 => {
            return FetchStatus::HardFail {
                error: FetchError::Http { status },
                retryable: true,
            }
        }
        _ => {
            return FetchStatus::HardFail {
                error: FetchError::Http { status },
                retryable: false,
            }
        }
    }

    if !is_html(content_type) {
        return FetchStatus::HardFail {
            error: FetchError::UnsupportedContent(content_type.to_string()),
            retryable: false,
        };
    }

    let chars = visible_text_len(&body);
    // Marker text inside a readable page is quoted, not served
    if chars < min_text_chars && is_challenge(&body) {
        return FetchStatus::SoftBlock {
            reason: BlockReason::Challenge,
            page: None,
        };
    }

    let page = FetchedPage {
        final_url,
        content_type: content_type.to_string(),
        body,
    };

    if chars < min_text_chars {
        FetchStatus::SoftBlock {
            reason: BlockReason::Thin { chars },
            page: Some(page),
        }
    } else {
        FetchStatus::Success(page)
    }
}

/// Returns true for HTML content types; a missing header is assumed HTML
pub fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.trim().is_empty() || ct.contains("text/html") || ct.contains("application/xhtml")
}

fn is_challenge(body: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Counts non-whitespace characters a reader would see on the page
pub fn visible_text_len(html: &str) -> usize {
    let document = Html::parse_document(html);
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                None
            } else {
                Some(text.split_whitespace().map(str::len).sum::<usize>())
            }
        })
        .sum()
}

/// Retry and escalation limits
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per strategy on a retryable hard failure
    pub attempts: u32,
    pub backoff: Duration,
    pub browser_available: bool,
}

/// What the selector wants done after an attempt
#[derive(Debug, Clone)]
pub enum Decision {
    Accept(FetchedPage),
    /// Try the same strategy again after the delay
    Retry {
        strategy: Strategy,
        delay: Duration,
    },
    Escalate {
        from: Strategy,
        to: Strategy,
        reason: String,
    },
    GiveUp(FetchError),
}

/// Per-URL escalation state machine
#[derive(Debug)]
pub struct StrategySelector {
    policy: RetryPolicy,
    current: Strategy,
    attempts_at_current: u32,
    fallback: Option<FetchedPage>,
}

impl StrategySelector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            current: Strategy::PlainRequest,
            attempts_at_current: 0,
            fallback: None,
        }
    }

    /// Strategy the next attempt must use
    pub fn current(&self) -> Strategy {
        self.current
    }

    /// Feeds one attempt's outcome and returns the next step
    pub fn observe(&mut self, status: FetchStatus) -> Decision {
        self.attempts_at_current += 1;

        match status {
            FetchStatus::Success(page) => Decision::Accept(page),

            FetchStatus::SoftBlock { reason, page } => {
                if let Some(page) = page {
                    self.keep_fallback(page);
                }
                self.escalate_or_finish(reason.to_string(), FetchError::Blocked(reason.to_string()))
            }

            FetchStatus::HardFail { error, retryable } => {
                if is_permanent(&error) {
                    return Decision::GiveUp(error);
                }
                if retryable && self.attempts_at_current < self.policy.attempts {
                    let exponent = self.attempts_at_current.saturating_sub(1).min(16);
                    return Decision::Retry {
                        strategy: self.current,
                        delay: self.policy.backoff * 2u32.pow(exponent),
                    };
                }
                self.escalate_or_finish(error.to_string(), error)
            }
        }
    }

    fn escalate_or_finish(&mut self, reason: String, error: FetchError) -> Decision {
        match self.current.next(self.policy.browser_available) {
            Some(next) => {
                let from = self.current;
                self.current = next;
                self.attempts_at_current = 0;
                Decision::Escalate {
                    from,
                    to: next,
                    reason,
                }
            }
            // A thin page beats no page once every strategy is spent
            None => match self.fallback.take() {
                Some(page) => Decision::Accept(page),
                None => Decision::GiveUp(error),
            },
        }
    }

    fn keep_fallback(&mut self, page: FetchedPage) {
        let longer = self
            .fallback
            .as_ref()
            .map_or(true, |kept| page.body.len() > kept.body.len());
        if longer {
            self.fallback = Some(page);
        }
    }
}

/// Failures no strategy can fix
fn is_permanent(error: &FetchError) -> bool {
    matches!(
        error,
        FetchError::Http { status: 404 | 410 } | FetchError::UnsupportedContent(_)
    )
}
