//! Source plugins
//!
//! A plugin knows how to delimit content on one family of sites. The
//! registry is keyed by plugin name; a source opts in with `plugin = "..."`.
//! Adding a plugin never touches the crawler.

use crate::config::PluginConfig;
use crate::extract::html::to_markdown;
use crate::output::{CanonicalItem, ContentType};
use crate::{ConfigError, ExtractionError};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// What a plugin sees of a fetched page
#[derive(Debug, Clone, Copy)]
pub struct PageInput<'a> {
    pub url: &'a Url,
    pub document: &'a Html,
    /// Content type configured for the source
    pub content_type: ContentType,
}

/// Site-specific extraction
pub trait SourcePlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Produces the items of one page
    ///
    /// An empty vec means the page holds nothing for this plugin.
    fn extract(&self, page: &PageInput<'_>) -> Result<Vec<CanonicalItem>, ExtractionError>;
}

/// Plugins by name
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn SourcePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds selector plugins for every `[[plugin]]` table
    pub fn from_config(configs: &[PluginConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Arc::new(SelectorPlugin::from_config(config)?));
        }
        Ok(registry)
    }

    /// Adds a plugin, replacing any with the same name
    pub fn register(&mut self, plugin: Arc<dyn SourcePlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourcePlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

/// Plugin driven by a CSS selector map
#[derive(Debug)]
pub struct SelectorPlugin {
    name: String,
    title: Selector,
    content: Selector,
    elements: Option<Selector>,
    author: Option<String>,
}

impl SelectorPlugin {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| {
                ConfigError::Validation(format!(
                    "plugin '{}': invalid selector '{}': {}",
                    config.name, css, e
                ))
            })
        };

        let elements = if config.element_selectors.is_empty() {
            None
        } else {
            Some(parse(&config.element_selectors.join(", "))?)
        };

        Ok(Self {
            name: config.name.clone(),
            title: parse(&config.title_selector)?,
            content: parse(&config.content_selector)?,
            elements,
            author: config.author.clone(),
        })
    }

    fn error(&self, message: impl Into<String>) -> ExtractionError {
        ExtractionError::Plugin {
            plugin: self.name.clone(),
            message: message.into(),
        }
    }

    /// Markdown of the matched elements inside the container
    ///
    /// Elements nested in another match are skipped so nothing appears
    /// twice.
    fn collect_elements(&self, container: ElementRef, elements: &Selector) -> String {
        let matched: Vec<ElementRef> = container.select(elements).collect();
        let ids: HashSet<_> = matched.iter().map(|el| el.id()).collect();

        matched
            .iter()
            .filter(|el| !el.ancestors().any(|anc| ids.contains(&anc.id())))
            .filter_map(|el| to_markdown(&el.html()).ok())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl SourcePlugin for SelectorPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, page: &PageInput<'_>) -> Result<Vec<CanonicalItem>, ExtractionError> {
        let Some(container) = page.document.select(&self.content).next() else {
            return Err(self.error("content selector matched nothing"));
        };

        let content = match &self.elements {
            Some(elements) => self.collect_elements(container, elements),
            None => to_markdown(&container.html()).unwrap_or_default(),
        };
        if content.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        let title = page
            .document
            .select(&self.title)
            .next()
            .map(|el| {
                el.text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.error("title selector matched nothing"))?;

        let mut item = CanonicalItem::new(title, content, page.content_type)
            .with_source_url(page.url.as_str());
        if let Some(author) = &self.author {
            item = item.with_author(author);
        }
        Ok(vec![item])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(elements: &[&str]) -> PluginConfig {
        PluginConfig {
            name: "docs".to_string(),
            title_selector: "h1.title".to_string(),
            content_selector: "div.doc".to_string(),
            element_selectors: elements.iter().map(|s| s.to_string()).collect(),
            author: Some("Docs Team".to_string()),
        }
    }

    const PAGE: &str = r#"<html><body>
        <h1 class="title">Install Guide</h1>
        <div class="sidebar"><p>Ignore me</p></div>
        <div class="doc">
          <h2>Steps</h2>
          <p>Download the archive.</p>
          <div class="ad">Buy now</div>
          <pre><code>tar xf archive.tgz</code></pre>
          <blockquote><p>Nested quote text</p></blockquote>
        </div></body></html>"#;

    fn run(plugin: &SelectorPlugin, html: &str) -> Result<Vec<CanonicalItem>, ExtractionError> {
        let url = Url::parse("https://docs.example.com/guide/install").unwrap();
        let document = Html::parse_document(html);
        plugin.extract(&PageInput {
            url: &url,
            document: &document,
            content_type: ContentType::Other,
        })
    }

    #[test]
    fn test_whole_container() {
        let plugin = SelectorPlugin::from_config(&config(&[])).unwrap();
        let items = run(&plugin, PAGE).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "Install Guide");
        assert_eq!(item.author, "Docs Team");
        assert_eq!(item.source_url, "https://docs.example.com/guide/install");
        assert_eq!(item.content_type, ContentType::Other);
        assert!(item.content.contains("Download the archive"));
        assert!(item.content.contains("Buy now"));
        assert!(!item.content.contains("Ignore me"));
    }

    #[test]
    fn test_element_selectors_filter_container() {
        let plugin = SelectorPlugin::from_config(&config(&["h2", "p", "pre", "blockquote"])).unwrap();
        let items = run(&plugin, PAGE).unwrap();
        let content = &items[0].content;
        assert!(content.contains("Steps"));
        assert!(content.contains("tar xf archive.tgz"));
        assert!(!content.contains("Buy now"));
        // The <p> inside the blockquote is not emitted twice
        assert_eq!(content.matches("Nested quote text").count(), 1);
    }

    #[test]
    fn test_missing_container_is_plugin_error() {
        let plugin = SelectorPlugin::from_config(&config(&[])).unwrap();
        let result = run(&plugin, "<h1 class='title'>T</h1><p>x</p>");
        assert!(matches!(result, Err(ExtractionError::Plugin { .. })));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut bad = config(&[]);
        bad.content_selector = "div[[".to_string();
        assert!(matches!(
            SelectorPlugin::from_config(&bad),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = PluginRegistry::from_config(&[config(&[])]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("docs").is_some());
        assert!(registry.get("other").is_none());
    }
}
