//! HTML content extraction
//!
//! Finds the main content region of an arbitrary page from structural
//! signals, converts it to markdown, and reads title and author metadata.
//!
//! # Region selection
//!
//! 1. A single `<article>`, or one that clearly dominates the others.
//!    Several comparable articles mean a listing page.
//! 2. `<main>` or `[role="main"]`.
//! 3. The `div`/`section` with the most text in direct block children.
//! 4. `<body>`.

use crate::ExtractionError;
use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| {
            Selector::parse($css).expect(concat!("hardcoded selector '", $css, "' is valid"))
        });
    };
}

selector!(ARTICLE, "article");
selector!(MAIN, "main, [role='main']");
selector!(CONTAINER, "div, section, td");
selector!(BODY, "body");
selector!(H1, "h1");
selector!(TITLE, "title");
selector!(OG_TITLE, "meta[property='og:title']");
selector!(
    AUTHOR_META,
    "meta[name='author'], meta[property='article:author'], meta[name='twitter:creator']"
);
selector!(AUTHOR_LINK, "[rel='author']");
selector!(ANCHOR, "a");

/// Tags dropped from the markdown
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "iframe", "svg",
    "button", "template",
];

/// Block elements counted when scoring container candidates
const BLOCK_TAGS: &[&str] = &[
    "p", "pre", "blockquote", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "table",
];

/// Above this share of linked text, a region is navigation
pub const MAX_LINK_DENSITY: f64 = 0.5;

/// Minimum share of all article text the largest article must hold
const DOMINANT_ARTICLE_SHARE: f64 = 0.6;

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build()
}

/// Content pulled from one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlArticle {
    pub title: String,
    pub markdown: String,
    /// Author from page metadata, if any
    pub author: Option<String>,
}

/// Extracts the main article of a page
pub fn extract_article(document: &Html) -> Result<HtmlArticle, ExtractionError> {
    let region = main_region(document)?;

    let (text_len, link_len) = text_and_link_len(region);
    if text_len == 0 {
        return Err(ExtractionError::EmptyContent);
    }
    let density = link_len as f64 / text_len as f64;
    if density >= MAX_LINK_DENSITY {
        return Err(ExtractionError::NavigationPage(density));
    }

    let markdown = to_markdown(&region.html())?;
    let title = extract_title(document, region).unwrap_or_default();

    Ok(HtmlArticle {
        title,
        markdown,
        author: extract_author(document),
    })
}

/// Converts an HTML fragment to markdown
///
/// Headings, lists, code blocks and links survive; chrome and scripts are
/// dropped.
pub fn to_markdown(html: &str) -> Result<String, ExtractionError> {
    let markdown = converter()
        .convert(html)
        .map_err(|e| ExtractionError::Unparseable(e.to_string()))?;
    let markdown = collapse_blank_lines(markdown.trim());
    if markdown.is_empty() {
        Err(ExtractionError::EmptyContent)
    } else {
        Ok(markdown)
    }
}

fn main_region(document: &Html) -> Result<ElementRef<'_>, ExtractionError> {
    let articles: Vec<ElementRef> = document.select(&ARTICLE).collect();
    if let Some(article) = dominant_article(&articles)? {
        return Ok(article);
    }

    if let Some(main) = document.select(&MAIN).next() {
        return Ok(main);
    }

    let best = document
        .select(&CONTAINER)
        .map(|el| (block_text_score(el), el))
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score);
    if let Some((_, el)) = best {
        return Ok(el);
    }

    Ok(document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element()))
}

/// Picks the article holding the page's content
///
/// Nested articles (comments inside a post) are ignored. Several articles
/// of similar size mark a listing page.
fn dominant_article<'a>(
    articles: &[ElementRef<'a>],
) -> Result<Option<ElementRef<'a>>, ExtractionError> {
    let ids: HashSet<_> = articles.iter().map(|a| a.id()).collect();
    let top_level: Vec<ElementRef<'a>> = articles
        .iter()
        .copied()
        .filter(|a| !a.ancestors().any(|anc| ids.contains(&anc.id())))
        .collect();

    match top_level.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => {
            let sizes: Vec<usize> = many.iter().map(|a| text_and_link_len(*a).0).collect();
            let total: usize = sizes.iter().sum();
            let (largest, size) = many
                .iter()
                .zip(sizes.iter())
                .max_by_key(|(_, size)| **size)
                .map(|(a, s)| (*a, *s))
                .ok_or(ExtractionError::EmptyContent)?;

            if total > 0 && size as f64 / total as f64 >= DOMINANT_ARTICLE_SHARE {
                Ok(Some(largest))
            } else {
                let (text, links) = many
                    .iter()
                    .map(|a| text_and_link_len(*a))
                    .fold((0, 0), |acc, (t, l)| (acc.0 + t, acc.1 + l));
                let density = if text == 0 { 1.0 } else { links as f64 / text as f64 };
                Err(ExtractionError::NavigationPage(density.max(MAX_LINK_DENSITY)))
            }
        }
    }
}

/// Text length of direct block children
fn block_text_score(el: ElementRef) -> usize {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| BLOCK_TAGS.contains(&child.value().name()))
        .map(|child| text_and_link_len(child).0)
        .sum()
}

/// Visible text length and the part of it inside links
fn text_and_link_len(el: ElementRef) -> (usize, usize) {
    let text: usize = visible_text(el).map(str::len).sum();
    let links: usize = el
        .select(&ANCHOR)
        .flat_map(|a| visible_text(a).collect::<Vec<_>>())
        .map(str::len)
        .sum();
    (text, links)
}

/// Whitespace-separated words outside script/style elements
fn visible_text(el: ElementRef<'_>) -> impl Iterator<Item = &str> {
    el.descendants()
        .filter(|node| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            })
        })
        .filter_map(|node| node.value().as_text())
        .flat_map(|text| text.split_whitespace())
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title: primary heading, then document title, then og:title
fn extract_title(document: &Html, region: ElementRef) -> Option<String> {
    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

    region
        .select(&H1)
        .next()
        .or_else(|| document.select(&H1).next())
        .and_then(|h1| non_empty(element_text(h1)))
        .or_else(|| {
            document
                .select(&TITLE)
                .next()
                .and_then(|t| non_empty(element_text(t)))
        })
        .or_else(|| {
            document
                .select(&OG_TITLE)
                .next()
                .and_then(|m| m.value().attr("content"))
                .and_then(|c| non_empty(c.trim().to_string()))
        })
}

/// Author from explicit page metadata only
fn extract_author(document: &Html) -> Option<String> {
    document
        .select(&AUTHOR_META)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty() && !c.starts_with("http"))
        .map(str::to_string)
        .or_else(|| {
            document
                .select(&AUTHOR_LINK)
                .map(element_text)
                .find(|t| !t.is_empty())
        })
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Result<HtmlArticle, ExtractionError> {
        extract_article(&Html::parse_document(html))
    }

    const POST: &str = r#"
<html>
<head>
  <title>Understanding Lifetimes | Example Blog</title>
  <meta name="author" content="Jane Writer">
</head>
<body>
  <header><a href="/">Home</a> <a href="/blog">Blog</a></header>
  <nav><a href="/blog/a">A</a><a href="/blog/b">B</a></nav>
  <article>
    <h1>Understanding Lifetimes</h1>
    <p>Lifetimes describe how long references stay valid in a program.</p>
    <h2>Why they matter</h2>
    <ul><li>Memory safety</li><li>No garbage collector</li></ul>
    <pre><code>fn longest&lt;'a&gt;(x: &amp;'a str) -&gt; &amp;'a str { x }</code></pre>
    <p>See the <a href="/blog/borrowing">borrowing guide</a> for more.</p>
  </article>
  <footer>Copyright</footer>
  <script>trackPageview();</script>
</body>
</html>"#;

    #[test]
    fn test_extracts_article_as_markdown() {
        let article = extract(POST).unwrap();
        assert_eq!(article.title, "Understanding Lifetimes");
        assert_eq!(article.author.as_deref(), Some("Jane Writer"));
        assert!(article.markdown.contains("Lifetimes describe"));
        assert!(article.markdown.contains("Why they matter"));
        assert!(article.markdown.contains("Memory safety"));
        assert!(article.markdown.contains("fn longest"));
        assert!(article.markdown.contains("(/blog/borrowing)"));
        assert!(!article.markdown.contains("Copyright"));
        assert!(!article.markdown.contains("trackPageview"));
    }

    #[test]
    fn test_falls_back_to_largest_text_block() {
        let html = r#"<html><head><title>Doc Page</title></head><body>
            <div class="sidebar"><ul><li><a href="/x">X</a></li></ul></div>
            <div class="content">
              <p>First paragraph with plenty of words to score well.</p>
              <p>Second paragraph that adds even more body text.</p>
            </div></body></html>"#;
        let article = extract(html).unwrap();
        assert_eq!(article.title, "Doc Page");
        assert!(article.markdown.contains("Second paragraph"));
        assert!(!article.markdown.contains("[X]"));
        assert_eq!(article.author, None);
    }

    #[test]
    fn test_main_landmark() {
        let html = r#"<body><div><p>outside</p></div><main><h1>Guide</h1><p>Inside the main landmark.</p></main></body>"#;
        let article = extract(html).unwrap();
        assert_eq!(article.title, "Guide");
        assert!(!article.markdown.contains("outside"));
    }

    #[test]
    fn test_link_heavy_page_is_navigation() {
        let html = r#"<body><main>
            <a href="/blog/one">First post title</a>
            <a href="/blog/two">Second post title</a>
            <a href="/blog/three">Third post title</a>
            <p>Posts</p></main></body>"#;
        assert!(matches!(
            extract(html),
            Err(ExtractionError::NavigationPage(_))
        ));
    }

    #[test]
    fn test_listing_of_articles_is_navigation() {
        let html = r#"<body>
            <article><h2>One</h2><p>Excerpt of the first post goes here.</p></article>
            <article><h2>Two</h2><p>Excerpt of the second post goes here.</p></article>
            <article><h2>Three</h2><p>Excerpt of the third post goes here.</p></article>
            </body>"#;
        assert!(matches!(
            extract(html),
            Err(ExtractionError::NavigationPage(_))
        ));
    }

    #[test]
    fn test_dominant_article_wins_over_related_cards() {
        let body = "Long body sentence for the real post. ".repeat(20);
        let html = format!(
            r#"<body><article><h1>Real</h1><p>{}</p></article>
               <article><h3>Related</h3><p>Short teaser.</p></article></body>"#,
            body
        );
        let article = extract(&html).unwrap();
        assert_eq!(article.title, "Real");
    }

    #[test]
    fn test_empty_page() {
        assert!(matches!(
            extract("<html><body><script>x()</script></body></html>"),
            Err(ExtractionError::EmptyContent)
        ));
    }

    #[test]
    fn test_title_falls_back_to_og_title() {
        let html = r#"<html><head><meta property="og:title" content="Shared Title"></head>
            <body><article><p>Body text of the article.</p></article></body></html>"#;
        assert_eq!(extract(html).unwrap().title, "Shared Title");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb  \n"), "a\n\nb");
    }
}
