//! Crawl scenarios: discovery, scope, dedup, budgets, robots and sitemaps

use crate::common::{html, mount_page, post_page, run, test_config, web_source};
use kb_harvester::ContentType;
use std::collections::HashSet;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Index page linking each post twice (nav and listing) plus off-scope links
fn blog_index() -> String {
    r#"<html><head><title>Test Blog</title></head><body>
    <nav>
      <a href="/blog/post-1">Post One</a>
      <a href="/blog/post-2">Post Two</a>
      <a href="/blog/post-3">Post Three</a>
      <a href="/about">About us</a>
    </nav>
    <main>
      <h1>Blog</h1>
      <ul>
        <li><a href="/blog/post-1?utm_source=listing">Post One: ownership in practice</a></li>
        <li><a href="/blog/post-2#comments">Post Two: borrowing without tears</a></li>
        <li><a href="/blog/post-3/">Post Three: lifetimes explained</a></li>
      </ul>
    </main>
    </body></html>"#
        .to_string()
}

/// Mounts the three-post blog; every page must be fetched exactly once
async fn mount_blog(server: &MockServer) {
    mount_page(server, "/blog", blog_index(), 1).await;
    mount_page(server, "/blog/post-1", post_page("Post One", &["/blog/post-2", "/blog/post-3"]), 1).await;
    mount_page(server, "/blog/post-2", post_page("Post Two", &["/blog/post-1"]), 1).await;
    mount_page(server, "/blog/post-3", post_page("Post Three", &["/blog/post-1", "/blog"]), 1).await;
    mount_page(server, "/about", post_page("About", &[]), 0).await;
}

#[tokio::test]
async fn test_static_blog_yields_one_item_per_post() {
    let server = MockServer::start().await;
    mount_blog(&server).await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    assert!(!outcome.has_config_errors());
    let items = &outcome.document.items;
    assert_eq!(items.len(), 3, "expected one item per post: {:#?}", items);

    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Post One", "Post Two", "Post Three"]);

    for item in items {
        assert_eq!(item.content_type, ContentType::Blog);
        assert!(item.source_url.starts_with(&format!("{}/blog/post-", server.uri())));
        assert!(item.content.contains("explains one idea"));
        assert!(item.content.contains("let x = 42;"));
        assert_eq!(item.user_id, "");
    }
    assert_eq!(outcome.document.team_id, "team-test");
    assert_eq!(outcome.summary.pages_failed, 0);
    assert_eq!(outcome.summary.pages_fetched, 4);
}

#[tokio::test]
async fn test_overlapping_sources_collapse_by_url() {
    let server = MockServer::start().await;
    mount_page(&server, "/blog", blog_index(), 1).await;
    Mock::given(method("GET"))
        .and(path("/blog/post-1"))
        .respond_with(html(post_page("Post One", &[])))
        .mount(&server)
        .await;
    mount_page(&server, "/blog/post-2", post_page("Post Two", &[]), 1).await;
    mount_page(&server, "/blog/post-3", post_page("Post Three", &[]), 1).await;

    let config = test_config(vec![
        web_source("blog", format!("{}/blog", server.uri()), true),
        web_source("featured", format!("{}/blog/post-1", server.uri()), false),
    ]);
    let outcome = run(config).await;

    let urls: Vec<&str> = outcome.document.items.iter().map(|i| i.source_url.as_str()).collect();
    let unique: HashSet<&str> = urls.iter().copied().collect();
    assert_eq!(urls.len(), 3);
    assert_eq!(unique.len(), 3);
    assert_eq!(outcome.summary.duplicates_collapsed, 1);
}

#[tokio::test]
async fn test_redirect_to_known_page_is_not_duplicated() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/blog",
        r#"<html><body><main><h1>Blog</h1>
           <a href="/blog/post-1">Post One</a>
           <a href="/blog/old-post-1">Old link to post one</a>
           </main></body></html>"#
            .to_string(),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/blog/old-post-1"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/blog/post-1", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/post-1"))
        .respond_with(html(post_page("Post One", &[])))
        .mount(&server)
        .await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    assert_eq!(outcome.document.items.len(), 1);
    assert_eq!(outcome.document.items[0].title, "Post One");
}

#[tokio::test]
async fn test_explicit_scope_limits_discovery() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/guide",
        post_page("Guide Home", &["/guide/chapter-1", "/guide-extra", "/blog/post"]),
        1,
    )
    .await;
    mount_page(&server, "/guide/chapter-1", post_page("Chapter One", &[]), 1).await;
    mount_page(&server, "/guide-extra", post_page("Extra", &[]), 0).await;
    mount_page(&server, "/blog/post", post_page("Blog Post", &[]), 0).await;

    let mut source = web_source("guide", format!("{}/guide", server.uri()), true);
    source.scope_prefix = Some("/guide".to_string());
    let outcome = run(test_config(vec![source])).await;

    let titles: Vec<&str> = outcome.document.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Guide Home", "Chapter One"]);
}

#[tokio::test]
async fn test_single_document_source_does_not_follow_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/company/guide",
        post_page("Company Guide", &["/company/guide/more"]),
        1,
    )
    .await;
    mount_page(&server, "/company/guide/more", post_page("More", &[]), 0).await;

    let config = test_config(vec![web_source(
        "guide",
        format!("{}/company/guide", server.uri()),
        false,
    )]);
    let outcome = run(config).await;

    assert_eq!(outcome.document.items.len(), 1);
    assert_eq!(outcome.document.items[0].title, "Company Guide");
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /blog/private\n"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/blog",
        post_page("Blog Home", &["/blog/public", "/blog/private"]),
        1,
    )
    .await;
    mount_page(&server, "/blog/public", post_page("Public", &[]), 1).await;
    mount_page(&server, "/blog/private", post_page("Private", &[]), 0).await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    let titles: Vec<&str> = outcome.document.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Blog Home", "Public"]);
    assert_eq!(outcome.summary.pages_skipped, 1);
}

#[tokio::test]
async fn test_sitemap_seeds_unlinked_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0"?><urlset>
                   <url><loc>{0}/blog/hidden</loc></url>
                   <url><loc>{0}/shop/item</loc></url>
                   </urlset>"#,
                server.uri()
            ),
            "application/xml",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/blog", post_page("Blog Home", &[]), 1).await;
    mount_page(&server, "/blog/hidden", post_page("Hidden Post", &[]), 1).await;
    mount_page(&server, "/shop/item", post_page("Shop", &[]), 0).await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    let titles: Vec<&str> = outcome.document.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Blog Home", "Hidden Post"]);
}

#[tokio::test]
async fn test_feed_seeds_unlinked_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0"?><rss version="2.0"><channel>
                   <title>Test Blog</title><link>{0}/blog</link>
                   <item><title>Hidden</title><link>{0}/blog/hidden</link></item>
                   <item><title>Elsewhere</title><link>{0}/news/elsewhere</link></item>
                   </channel></rss>"#,
                server.uri()
            ),
            "application/rss+xml",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/blog", post_page("Blog Home", &[]), 1).await;
    mount_page(&server, "/blog/hidden", post_page("Hidden Post", &[]), 1).await;
    mount_page(&server, "/news/elsewhere", post_page("Elsewhere", &[]), 0).await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    let titles: Vec<&str> = outcome.document.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Blog Home", "Hidden Post"]);
}

#[tokio::test]
async fn test_advertised_atom_feed_is_read() {
    let server = MockServer::start().await;
    let home = post_page("Blog Home", &[]).replacen(
        "<head>",
        r#"<head><link rel="alternate" type="application/atom+xml" href="/blog/posts.atom">"#,
        1,
    );
    mount_page(&server, "/blog", home, 1).await;
    Mock::given(method("GET"))
        .and(path("/blog/posts.atom"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Blog</title>
               <entry><title>From Atom</title><link rel="alternate" href="/blog/from-atom"/></entry>
               </feed>"#,
            "application/atom+xml",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/blog/from-atom", post_page("From Atom", &[]), 1).await;

    let config = test_config(vec![web_source("blog", format!("{}/blog", server.uri()), true)]);
    let outcome = run(config).await;

    let titles: Vec<&str> = outcome.document.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Blog Home", "From Atom"]);
}

/// Generates an endless documentation section: every page links onward
struct DocsSite;

impl Respond for DocsSite {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n: usize = request
            .url
            .path()
            .trim_start_matches("/docs/page-")
            .parse()
            .unwrap_or(0);
        let links: Vec<String> = (1..=5).map(|k| format!("/docs/page-{}", (n + k) % 50)).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        html(post_page(&format!("Docs Page {}", n), &refs))
    }
}

#[tokio::test]
async fn test_page_budget_bounds_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/docs/page-\d+$"))
        .respond_with(DocsSite)
        .mount(&server)
        .await;

    let mut config = test_config(vec![web_source("docs", format!("{}/docs/page-0", server.uri()), true)]);
    config.crawler.max_pages = Some(5);
    let outcome = run(config).await;

    assert!(!outcome.has_config_errors());
    assert!(outcome.document.items.len() <= 5);
    assert!(!outcome.document.items.is_empty());

    let requests = server.received_requests().await.expect("request recording enabled");
    let page_fetches = requests
        .iter()
        .filter(|r| r.url.path().starts_with("/docs/page-"))
        .count();
    assert!(page_fetches <= 5, "fetched {} pages", page_fetches);
}

#[tokio::test]
async fn test_cancelled_run_still_produces_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/docs/page-\d+$"))
        .respond_with(DocsSite)
        .mount(&server)
        .await;

    let config = test_config(vec![web_source("docs", format!("{}/docs/page-0", server.uri()), true)]);
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let ctx = kb_harvester::run::RunContext::new(config, cancel).unwrap();
    let outcome = kb_harvester::run::run_sources(&ctx).await;

    assert!(outcome.document.items.len() < 50);
    assert_eq!(outcome.document.team_id, "team-test");
}
