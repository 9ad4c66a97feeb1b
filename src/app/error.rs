use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartRssError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Feed parsing error: {0}")]
    Parse(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Download aborted")]
    Aborted,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for SmartRssError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SmartRssError::Network(format!("request timed out: {}", e))
        } else {
            SmartRssError::Network(e.to_string())
        }
    }
}

impl SmartRssError {
    /// Whether this error is the cooperative-cancellation marker rather than a failure
    pub fn is_aborted(&self) -> bool {
        matches!(self, SmartRssError::Aborted)
    }
}

/// Failures of the full-text extraction step. All of them are recovered by
/// keeping the feed-provided summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("full-text extraction is disabled for this source")]
    Disabled,

    #[error("selector matched no nodes: {0}")]
    NoMatch(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("extracted text too short ({0} chars)")]
    InsufficientContent(usize),
}

pub type Result<T> = std::result::Result<T, SmartRssError>;
