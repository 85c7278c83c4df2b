//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; Crawl-delay
//! and Sitemap lines are read here since the matcher ignores them.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content; empty means allow all
    content: String,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay in seconds that applies to the user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_agent_lines = false;
        let mut for_agent = None;
        let mut for_wildcard = None;

        for (key, value) in directives(&self.content) {
            match key.as_str() {
                "user-agent" => {
                    if !in_agent_lines {
                        group.clear();
                    }
                    group.push(value.to_lowercase());
                    in_agent_lines = true;
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        for_agent = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard = Some(delay);
                    }
                }
                _ => in_agent_lines = false,
            }
        }

        for_agent.or(for_wildcard)
    }

    /// Returns every `Sitemap:` URL listed, in file order
    ///
    /// Sitemap lines are global and not tied to a user-agent group.
    pub fn sitemaps(&self) -> Vec<String> {
        directives(&self.content)
            .filter(|(key, _)| key == "sitemap")
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

/// Iterates `key: value` lines with comments stripped and keys lowercased
fn directives(content: &str) -> impl Iterator<Item = (String, &str)> {
    content.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_lowercase(), value.trim()))
    })
}
