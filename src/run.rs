//! Run entry points
//!
//! A [`RunContext`] carries everything one invocation shares: the config,
//! the fetcher with its per-host politeness state, the extractor with its
//! plugin registry, the global fetch slots, the cancellation token, and the
//! run statistics. Nothing here is process-global; two runs in one process
//! do not interfere.

use crate::config::{validate, Config, FetchConfig, SourceConfig, SourceKind};
use crate::crawler::{Coordinator, Fetcher, HostLimiter, PageRenderer};
use crate::extract::{book_title_from_path, read_pdf, Extractor};
use crate::output::{Aggregator, CanonicalItem, OutputDocument, RunStats, RunSummary};
use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Shared state of one run
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<Config>,
    pub fetcher: Arc<Fetcher>,
    pub extractor: Arc<Extractor>,
    /// Caps in-flight fetches across all sources
    pub fetch_slots: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub stats: Arc<RunStats>,
}

impl RunContext {
    /// Builds the context for a validated config
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self, HarvestError> {
        let limiter = Arc::new(HostLimiter::new(Duration::from_millis(
            config.crawler.politeness_delay_ms,
        )));
        let fetcher = Fetcher::new(&config.fetch, limiter, build_renderer(&config.fetch))?;
        let extractor = Extractor::from_config(&config)?;
        let slots = config.crawler.max_concurrency.max(1) as usize;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            fetch_slots: Arc::new(Semaphore::new(slots)),
            stats: Arc::new(RunStats::new()),
            config: Arc::new(config),
            cancel,
        })
    }
}

#[cfg(feature = "browser")]
fn build_renderer(config: &FetchConfig) -> Option<Arc<dyn PageRenderer>> {
    config.browser.then(|| {
        Arc::new(crate::crawler::ChromiumRenderer::new(Duration::from_secs(
            config.timeout_secs,
        ))) as Arc<dyn PageRenderer>
    })
}

#[cfg(not(feature = "browser"))]
fn build_renderer(config: &FetchConfig) -> Option<Arc<dyn PageRenderer>> {
    if config.browser {
        tracing::warn!("Browser rendering requested but not compiled in (enable the `browser` feature)");
    }
    None
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    pub document: OutputDocument,
    pub summary: RunSummary,
    /// Sources that could not run at all, by name
    pub config_errors: Vec<(String, ConfigError)>,
}

impl RunOutcome {
    pub fn has_config_errors(&self) -> bool {
        !self.config_errors.is_empty()
    }
}

/// Harvests every configured source concurrently
///
/// Per-page failures never fail the run. A source that cannot start is
/// recorded in [`RunOutcome::config_errors`] while the others finish.
pub async fn run_sources(ctx: &RunContext) -> RunOutcome {
    let config = ctx.config.clone();
    let aggregator = Aggregator::new(
        config.team_id.clone(),
        config.sources.iter().map(|s| s.name.clone()).collect(),
        config.output.dedupe_content,
    );

    let mut tasks = JoinSet::new();
    for source in config.sources.iter().cloned() {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let name = source.name.clone();
            (name, harvest_source(ctx, source).await)
        });
    }

    let mut config_errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(items))) => {
                ctx.stats.record_source(true);
                aggregator.add(&name, items);
            }
            Ok((name, Err(e))) => {
                tracing::error!("Source '{}' failed: {}", name, e);
                ctx.stats.record_source(false);
                config_errors.push((name, e));
            }
            Err(e) => {
                tracing::error!("Source task failed: {}", e);
                ctx.stats.record_source(false);
            }
        }
    }

    let document = aggregator.finalize();
    ctx.stats.record_items(document.items.len() as u64);
    ctx.stats.record_dropped(aggregator.rejected() as u64);
    let summary = ctx.stats.summary(aggregator.collapsed() as u64);
    tracing::info!(
        "Run finished: {} items from {} sources in {:.1}s",
        document.items.len(),
        config.sources.len(),
        summary.duration_seconds
    );

    RunOutcome {
        document,
        summary,
        config_errors,
    }
}

/// Harvests one source of either kind
pub async fn harvest_source(
    ctx: RunContext,
    source: SourceConfig,
) -> Result<Vec<CanonicalItem>, ConfigError> {
    match source.kind {
        SourceKind::Web => Ok(Coordinator::new(ctx, source)?.run().await),
        SourceKind::Pdf => process_pdf(&ctx, &source).await,
    }
}

/// Splits one PDF source into chapter items
///
/// An unreadable file fails the source; a file that is readable but holds
/// no extractable text yields no items.
pub async fn process_pdf(
    ctx: &RunContext,
    source: &SourceConfig,
) -> Result<Vec<CanonicalItem>, ConfigError> {
    let path = Path::new(&source.origin);
    let bytes = read_pdf(path).await?;
    let title = book_title_from_path(path);
    tracing::info!("Processing PDF '{}' from {}", title, path.display());

    match ctx.extractor.extract_pdf(source, bytes, &title).await {
        Ok(items) => {
            tracing::info!("Extracted {} sections from {}", items.len(), path.display());
            Ok(items)
        }
        Err(e) => {
            tracing::warn!("No content extracted from {}: {}", path.display(), e);
            ctx.stats.record_dropped(1);
            Ok(Vec::new())
        }
    }
}

/// Restricts a config to the named sources, keeping config order
///
/// An empty selection keeps every source.
pub fn select_sources(config: &mut Config, names: &[String]) -> Result<(), ConfigError> {
    if names.is_empty() {
        return Ok(());
    }
    if let Some(missing) = names
        .iter()
        .find(|name| !config.sources.iter().any(|s| &s.name == *name))
    {
        return Err(ConfigError::MissingSource(missing.clone()));
    }
    config.sources.retain(|s| names.contains(&s.name));
    Ok(())
}

/// Runs every source of a config file
pub async fn run_config(config: Config, cancel: CancellationToken) -> Result<RunOutcome, HarvestError> {
    let ctx = RunContext::new(config, cancel)?;
    Ok(run_sources(&ctx).await)
}

/// Crawls one site from a seed URL, outside any configured source
pub async fn crawl_site(
    mut config: Config,
    seed: &str,
    scope_prefix: Option<String>,
    cancel: CancellationToken,
) -> Result<RunOutcome, HarvestError> {
    let parsed = Url::parse(seed).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", seed, e)))?;
    let name = parsed.host_str().unwrap_or(seed).to_string();

    config.sources = vec![SourceConfig {
        name,
        origin: seed.to_string(),
        kind: SourceKind::Web,
        content_type: None,
        scope_prefix,
        crawl: true,
        author: None,
        plugin: None,
    }];
    validate(&config)?;
    run_config(config, cancel).await
}

/// Processes one PDF file, outside any configured source
pub async fn process_pdf_file(
    mut config: Config,
    path: &Path,
    author: Option<String>,
    cancel: CancellationToken,
) -> Result<RunOutcome, HarvestError> {
    config.sources = vec![SourceConfig {
        name: book_title_from_path(path),
        origin: path.to_string_lossy().into_owned(),
        kind: SourceKind::Pdf,
        content_type: None,
        scope_prefix: None,
        crawl: false,
        author,
        plugin: None,
    }];
    validate(&config)?;
    run_config(config, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(names: &[&str]) -> Config {
        let mut config = Config::default();
        config.sources = names
            .iter()
            .map(|name| SourceConfig {
                name: name.to_string(),
                origin: format!("https://example.com/{}", name),
                kind: SourceKind::Web,
                content_type: None,
                scope_prefix: None,
                crawl: true,
                author: None,
                plugin: None,
            })
            .collect();
        config
    }

    #[test]
    fn test_select_sources() {
        let mut config = named(&["blog", "guide", "docs"]);
        select_sources(&mut config, &["docs".to_string(), "blog".to_string()]).unwrap();
        let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["blog", "docs"]);

        let mut config = named(&["blog"]);
        assert!(matches!(
            select_sources(&mut config, &["podcast".to_string()]),
            Err(ConfigError::MissingSource(name)) if name == "podcast"
        ));

        let mut config = named(&["blog"]);
        select_sources(&mut config, &[]).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_pdf_is_config_error() {
        let outcome = process_pdf_file(
            Config::default(),
            Path::new("/nonexistent/dir/book.pdf"),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.has_config_errors());
        assert!(matches!(
            outcome.config_errors[0].1,
            ConfigError::UnreadableFile { .. }
        ));
        assert!(outcome.document.items.is_empty());
        assert_eq!(outcome.document.team_id, "aline123");
        assert_eq!(outcome.summary.sources_failed, 1);
    }

    #[tokio::test]
    async fn test_invalid_seed_rejected() {
        let result = crawl_site(Config::default(), "not a url", None, CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(HarvestError::Config(ConfigError::InvalidUrl(_)))
        ));
    }

    #[tokio::test]
    async fn test_seed_outside_scope_is_source_error() {
        let outcome = crawl_site(
            Config::default(),
            "https://example.invalid/docs/intro",
            Some("/blog".to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(
            outcome.config_errors[0].1,
            ConfigError::Validation(_)
        ));
    }
}
