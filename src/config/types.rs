use crate::output::ContentType;
use crate::url::QueryPolicy;
use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Team identifier stamped on the output document
    #[serde(default = "default_team_id")]
    pub team_id: String,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Ordered list of sources; output follows this order
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,

    /// Selector-map plugins referenced by sources
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            team_id: default_team_id(),
            crawler: CrawlerConfig::default(),
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
            sources: Vec::new(),
            plugins: Vec::new(),
        }
    }
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers (also the global fetch slot count)
    pub max_concurrency: u32,

    /// Maximum link depth from the seed; `None` means unbounded within scope
    pub max_depth: Option<u32>,

    /// Page budget per source; `None` means unbounded
    pub max_pages: Option<u32>,

    /// Time budget per source in seconds
    pub max_duration_secs: Option<u64>,

    /// Minimum time between requests to the same host (milliseconds)
    pub politeness_delay_ms: u64,

    /// Honor robots.txt Disallow and Crawl-delay
    pub respect_robots: bool,

    /// Seed the frontier from robots.txt / sitemap.xml sitemaps
    pub use_sitemaps: bool,

    /// Seed the frontier from RSS/Atom feeds under the scope
    pub use_feeds: bool,

    /// How query strings participate in the frontier key
    pub query_policy: QueryPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_depth: Some(8),
            max_pages: None,
            max_duration_secs: None,
            politeness_delay_ms: 500,
            respect_robots: true,
            use_sitemaps: true,
            use_feeds: true,
            query_policy: QueryPolicy::Drop,
        }
    }
}

/// Fetcher and strategy escalation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per strategy on a hard failure before escalating
    pub retry_attempts: u32,

    /// Base backoff between attempts (doubled per attempt)
    pub retry_backoff_ms: u64,

    /// Pages with fewer visible text characters are judged a soft block
    pub min_text_chars: usize,

    /// User agent for plain requests
    pub user_agent: String,

    /// Enable the full browser render strategy
    pub browser: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_attempts: 2,
            retry_backoff_ms: 500,
            min_text_chars: 200,
            user_agent: format!(
                "kb-harvester/{} (+https://github.com/kb-harvester)",
                env!("CARGO_PKG_VERSION")
            ),
            browser: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path of the JSON output document
    pub path: String,

    /// Collapse items without a source URL when their content hashes match
    pub dedupe_content: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "knowledge_base.json".to_string(),
            dedupe_content: false,
        }
    }
}

/// Where a source's content comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Pdf,
}

/// One configured entry to harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Unique source name
    pub name: String,

    /// Seed URL for web sources, file path for PDF sources
    pub origin: String,

    #[serde(default = "default_kind")]
    pub kind: SourceKind,

    /// Content type stamped on every item; defaults by kind
    #[serde(default)]
    pub content_type: Option<ContentType>,

    /// Path prefix constraining discovery; inferred from the origin if absent
    #[serde(default)]
    pub scope_prefix: Option<String>,

    /// Follow links; `false` fetches only the origin
    #[serde(default = "default_true")]
    pub crawl: bool,

    /// Author used when the page carries no author metadata
    #[serde(default)]
    pub author: Option<String>,

    /// Name of a `[[plugin]]` used for content delimiting
    #[serde(default)]
    pub plugin: Option<String>,
}

impl SourceConfig {
    /// Effective content type: `book` for PDFs, `blog` for web pages
    pub fn content_type(&self) -> ContentType {
        self.content_type.unwrap_or(match self.kind {
            SourceKind::Web => ContentType::Blog,
            SourceKind::Pdf => ContentType::Book,
        })
    }
}

/// CSS selector map for a particular site template
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    pub name: String,

    /// Selector for the item title
    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    /// Selector for the container holding the content
    pub content_selector: String,

    /// Element selectors collected inside the container; empty takes it whole
    #[serde(default)]
    pub element_selectors: Vec<String>,

    #[serde(default)]
    pub author: Option<String>,
}

fn default_team_id() -> String {
    "aline123".to_string()
}

fn default_kind() -> SourceKind {
    SourceKind::Web
}

fn default_true() -> bool {
    true
}

fn default_title_selector() -> String {
    "h1".to_string()
}
