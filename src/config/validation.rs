use crate::config::types::{Config, CrawlerConfig, FetchConfig, PluginConfig, SourceConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the run-wide parts of the configuration
///
/// Individual source origins and scopes are checked when the source is
/// resolved, so one broken source does not prevent the others from running.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.team_id.trim().is_empty() {
        return Err(ConfigError::Validation("team-id cannot be empty".to_string()));
    }
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_path(&config.output.path)?;
    validate_plugins(&config.plugins)?;
    validate_source_names(&config.sources, &config.plugins)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 64, got {}",
            config.max_concurrency
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_duration_secs == Some(0) {
        return Err(ConfigError::Validation(
            "max-duration-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "retry-attempts must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_path(path: &str) -> Result<(), ConfigError> {
    if path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates plugin tables: unique names and parseable selectors
fn validate_plugins(plugins: &[PluginConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for plugin in plugins {
        if plugin.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "plugin name cannot be empty".to_string(),
            ));
        }
        if !names.insert(plugin.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate plugin name '{}'",
                plugin.name
            )));
        }

        let selectors = std::iter::once(&plugin.title_selector)
            .chain(std::iter::once(&plugin.content_selector))
            .chain(plugin.element_selectors.iter());
        for selector in selectors {
            validate_selector(&plugin.name, selector)?;
        }
    }
    Ok(())
}

fn validate_selector(plugin: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map(|_| ()).map_err(|e| {
        ConfigError::Validation(format!(
            "plugin '{}' has an invalid selector '{}': {:?}",
            plugin, selector, e
        ))
    })
}

/// Validates source names are unique and plugin references resolve
fn validate_source_names(
    sources: &[SourceConfig],
    plugins: &[PluginConfig],
) -> Result<(), ConfigError> {
    let plugin_names: HashSet<&str> = plugins.iter().map(|p| p.name.as_str()).collect();
    let mut names = HashSet::new();

    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
        if let Some(plugin) = &source.plugin {
            if !plugin_names.contains(plugin.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "source '{}' references unknown plugin '{}'",
                    source.name, plugin
                )));
            }
        }
    }

    Ok(())
}

/// Validates a scope prefix
pub fn validate_scope_prefix(prefix: &str) -> Result<(), ConfigError> {
    if !prefix.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "scope prefix '{}' must start with '/'",
            prefix
        )));
    }
    if prefix.contains('?') || prefix.contains('#') {
        return Err(ConfigError::Validation(format!(
            "scope prefix '{}' must be a plain path",
            prefix
        )));
    }
    Ok(())
}
