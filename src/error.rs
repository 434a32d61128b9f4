//! Error type shared by the loaders, sequencers and resolver.

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Errors that can occur while loading, merging or fitting map content.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// A source could not be fetched or read.
    Fetch(String),
    /// A payload was fetched but could not be parsed.
    Parse(String),
    /// A topology document references arcs or objects it does not contain.
    Topology(String),
    /// A selector was constructed or configured incorrectly.
    InvalidSelector(String),
    /// The extent of the selected geometry cannot be fitted to the canvas.
    DegenerateExtent(String),
    /// A sequenced task was dropped before it produced a result.
    Abandoned,
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::Fetch(msg) => write!(f, "Fetch failed: {}", msg),
            MapError::Parse(msg) => write!(f, "Parse error: {}", msg),
            MapError::Topology(msg) => write!(f, "Invalid topology: {}", msg),
            MapError::InvalidSelector(msg) => write!(f, "Invalid selector: {}", msg),
            MapError::DegenerateExtent(msg) => write!(f, "Degenerate extent: {}", msg),
            MapError::Abandoned => write!(f, "Task was dropped before completing"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::Parse(e.to_string())
    }
}
