use kb_harvester::config::{Config, CrawlerConfig, FetchConfig, OutputConfig, SourceConfig, SourceKind};
use kb_harvester::run::{run_sources, RunContext, RunOutcome};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration for the given sources
pub fn test_config(sources: Vec<SourceConfig>) -> Config {
    Config {
        team_id: "team-test".to_string(),
        crawler: CrawlerConfig {
            max_concurrency: 4,
            max_depth: Some(5),
            max_pages: None,
            max_duration_secs: Some(30),
            politeness_delay_ms: 5, // Very short for testing
            ..CrawlerConfig::default()
        },
        fetch: FetchConfig {
            timeout_secs: 5,
            retry_attempts: 2,
            retry_backoff_ms: 10,
            min_text_chars: 20,
            user_agent: "TestBot/1.0".to_string(),
            browser: false,
        },
        output: OutputConfig::default(),
        sources,
        plugins: vec![],
    }
}

pub fn web_source(name: &str, origin: String, crawl: bool) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        origin,
        kind: SourceKind::Web,
        content_type: None,
        scope_prefix: None,
        crawl,
        author: None,
        plugin: None,
    }
}

pub async fn run(config: Config) -> RunOutcome {
    let ctx = RunContext::new(config, CancellationToken::new()).expect("Failed to build run context");
    run_sources(&ctx).await
}

pub fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// A post page with enough prose to pass the sufficiency check
pub fn post_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">related</a> "#, href))
        .collect();
    format!(
        r#"<html><head><title>{title} | Test Blog</title></head><body>
        <nav><a href="/blog">Blog</a></nav>
        <article>
          <h1>{title}</h1>
          <p>{title} explains one idea carefully, with enough prose that the page reads as a
             real article rather than a stub, and walks through an example step by step.</p>
          <h2>Details</h2>
          <p>A second paragraph elaborates on the idea and adds a short code sample.</p>
          <pre><code>let x = 42;</code></pre>
          <p>See also: {anchors}</p>
        </article>
        </body></html>"#
    )
}

/// Mounts a GET mock for an HTML page expected exactly `times` times
pub async fn mount_page(server: &MockServer, route: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .expect(times)
        .mount(server)
        .await;
}
