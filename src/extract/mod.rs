//! Content extraction
//!
//! Turns a fetched page or a PDF into canonical items. A source's plugin,
//! when it names one, delimits the content; otherwise the generic HTML
//! heuristics in [`html`] do. Errors here are per page: the caller logs
//! them and moves on.

pub mod html;
pub mod pdf;
pub mod plugin;

pub use html::{extract_article, to_markdown, HtmlArticle};
pub use pdf::{book_title_from_path, read_pdf, split_sections, Section};
pub use plugin::{PageInput, PluginRegistry, SelectorPlugin, SourcePlugin};

use crate::config::{Config, SourceConfig};
use crate::output::CanonicalItem;
use crate::{ConfigError, ExtractionError};
use scraper::Html;
use url::Url;

#[derive(Debug, Default)]
pub struct Extractor {
    plugins: PluginRegistry,
}

impl Extractor {
    pub fn new(plugins: PluginRegistry) -> Self {
        Self { plugins }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(PluginRegistry::from_config(&config.plugins)?))
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Items of one fetched HTML page
    pub fn extract_page(
        &self,
        source: &SourceConfig,
        url: &Url,
        document: &Html,
    ) -> Result<Vec<CanonicalItem>, ExtractionError> {
        let content_type = source.content_type();

        if let Some(name) = &source.plugin {
            let plugin = self.plugins.get(name).ok_or_else(|| ExtractionError::Plugin {
                plugin: name.clone(),
                message: "not registered".to_string(),
            })?;
            let items = plugin.extract(&PageInput {
                url,
                document,
                content_type,
            })?;
            return Ok(items
                .into_iter()
                .map(|item| with_default_author(item, source))
                .collect());
        }

        let article = extract_article(document)?;
        let title = if article.title.is_empty() {
            url.to_string()
        } else {
            article.title
        };

        let mut item = CanonicalItem::new(title, article.markdown, content_type)
            .with_source_url(url.as_str());
        if let Some(author) = article.author {
            item = item.with_author(author);
        }
        Ok(vec![with_default_author(item, source)])
    }

    /// Items of one PDF, one per chapter
    pub async fn extract_pdf(
        &self,
        source: &SourceConfig,
        bytes: Vec<u8>,
        book_title: &str,
    ) -> Result<Vec<CanonicalItem>, ExtractionError> {
        let text = pdf::extract_text(bytes).await?;
        Ok(sections_to_items(source, split_sections(&text, book_title)))
    }
}

/// Canonical items for PDF sections; PDFs have no source URL
pub fn sections_to_items(source: &SourceConfig, sections: Vec<Section>) -> Vec<CanonicalItem> {
    let content_type = source.content_type();
    sections
        .into_iter()
        .map(|section| {
            with_default_author(CanonicalItem::new(section.title, section.body, content_type), source)
        })
        .collect()
}

fn with_default_author(item: CanonicalItem, source: &SourceConfig) -> CanonicalItem {
    match &source.author {
        Some(author) if item.author.is_empty() => item.with_author(author.as_str()),
        _ => item,
    }
}
