//! Full browser rendering capability
//!
//! The crawler treats the headless browser as an external capability behind
//! [`PageRenderer`]. With the `browser` cargo feature enabled,
//! [`ChromiumRenderer`] drives a headless Chromium through `chromiumoxide`.

use crate::FetchError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Renders a page in a real browser and returns the resulting DOM as HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String, FetchError>;
}

/// Runs `work` under a time limit, then runs `cleanup` whatever the outcome
///
/// Browser resources opened before `work` must be released even when the
/// limit cuts `work` short.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) async fn bounded_with_cleanup<T, W, C>(
    limit: Duration,
    work: W,
    cleanup: C,
) -> Result<T, FetchError>
where
    W: Future<Output = Result<T, FetchError>>,
    C: Future<Output = ()>,
{
    let result = match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };
    cleanup.await;
    result
}

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;

#[cfg(feature = "browser")]
mod chromium {
    use super::{bounded_with_cleanup, PageRenderer};
    use crate::FetchError;
    use async_trait::async_trait;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::OnceCell;
    use tokio::task::JoinHandle;
    use url::Url;

    /// Headless Chromium renderer, launched on first use
    ///
    /// Most crawls never need the browser tier, so the process is only
    /// started when a URL actually escalates this far.
    pub struct ChromiumRenderer {
        browser: OnceCell<(Browser, JoinHandle<()>)>,
        timeout: Duration,
    }

    impl ChromiumRenderer {
        pub fn new(timeout: Duration) -> Self {
            Self {
                browser: OnceCell::new(),
                timeout,
            }
        }

        async fn browser(&self) -> Result<&Browser, FetchError> {
            let (browser, _) = self
                .browser
                .get_or_try_init(|| async {
                    let config = BrowserConfig::builder()
                        .no_sandbox()
                        .arg("--disable-gpu")
                        .arg("--disable-dev-shm-usage")
                        .build()
                        .map_err(FetchError::Render)?;

                    let (browser, mut handler) = Browser::launch(config)
                        .await
                        .map_err(|e| FetchError::Render(e.to_string()))?;

                    let handler_task = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                tracing::debug!("Browser handler error: {:?}", e);
                            }
                        }
                    });

                    tracing::info!("Launched headless browser");
                    Ok::<_, FetchError>((browser, handler_task))
                })
                .await?;
            Ok(browser)
        }
    }

    #[async_trait]
    impl PageRenderer for ChromiumRenderer {
        async fn render(&self, url: &Url) -> Result<String, FetchError> {
            let browser = self.browser().await?;

            // The tab exists before navigation starts so it can always be closed
            let page = tokio::time::timeout(self.timeout, browser.new_page("about:blank"))
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(render_error)?;

            let work = async {
                page.goto(url.as_str()).await.map_err(render_error)?;
                page.wait_for_navigation().await.map_err(render_error)?;
                page.content().await.map_err(render_error)
            };
            let tab = page.clone();
            let cleanup = async move {
                if let Err(e) = tab.close().await {
                    tracing::debug!("Failed to close page for {}: {}", url, e);
                }
            };

            bounded_with_cleanup(self.timeout, work, cleanup).await
        }
    }

    fn render_error(e: chromiumoxide::error::CdpError) -> FetchError {
        FetchError::Render(e.to_string())
    }
}
