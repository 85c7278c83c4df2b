use std::fmt;

/// Represents the state of one normalized URL in the frontier
///
/// A URL enters as `Pending` when admitted, moves to `Fetching` exactly once
/// when a worker pops it, and ends in one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Admitted and waiting in the queue
    Pending,

    /// Popped by a worker; the strategy chain is running
    Fetching,

    /// Fetched and handed to the extractor (zero or more items)
    Processed,

    /// Every strategy gave up, or the response was a permanent error
    Failed,

    /// Popped but not fetched: robots disallow, or a redirect landed on a
    /// URL that was already seen or lies outside the scope
    Skipped,
}

impl UrlState {
    /// Returns true if no further processing will happen for this URL
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Fetching)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
