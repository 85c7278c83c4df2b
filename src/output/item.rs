use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content an item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Blog,
    PodcastTranscript,
    CallTranscript,
    LinkedinPost,
    RedditComment,
    Book,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::PodcastTranscript => "podcast_transcript",
            Self::CallTranscript => "call_transcript",
            Self::LinkedinPost => "linkedin_post",
            Self::RedditComment => "reddit_comment",
            Self::Book => "book",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "blog" => Ok(Self::Blog),
            "podcast_transcript" => Ok(Self::PodcastTranscript),
            "call_transcript" => Ok(Self::CallTranscript),
            "linkedin_post" => Ok(Self::LinkedinPost),
            "reddit_comment" => Ok(Self::RedditComment),
            "book" => Ok(Self::Book),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// The universal output unit
///
/// Optional fields serialize as empty strings rather than being omitted,
/// which is what the knowledge-base importer expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub title: String,
    /// Markdown body
    pub content: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub user_id: String,
}

impl CanonicalItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            title: title.into().trim().to_string(),
            content: content.into().trim().to_string(),
            content_type,
            source_url: String::new(),
            author: String::new(),
            user_id: String::new(),
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into().trim().to_string();
        self
    }

    /// Items with an empty title or body never reach the output
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }
}

/// The single artifact a run produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub team_id: String,
    pub items: Vec<CanonicalItem>,
}
