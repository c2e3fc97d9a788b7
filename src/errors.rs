use chrono::NaiveDate;
use thiserror::Error;

/// Failures while obtaining prices from a remote provider.
///
/// None of these abort a run: the resolver in [`crate::sources`] downgrades
/// every variant to the synthetic series and logs a warning.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Connection, TLS or timeout failure from the HTTP client.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Provider returned HTTP {0}")]
    Http(reqwest::StatusCode),

    /// The provider refused the call because of its request quota.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// The credential was rejected or the request was otherwise invalid.
    #[error("Provider rejected the request: {0}")]
    InvalidCredential(String),

    /// The payload could not be interpreted as a daily time series.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Too few usable points survived parsing.
    #[error("Only {0} usable price points in payload")]
    InsufficientData(usize),
}

impl SourceError {
    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport(_) => true,
            SourceError::Http(status) => status.is_server_error(),
            _ => false,
        }
    }
}

/// Fatal errors in the change and ranking calculations.
#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("Not enough data to analyze: need at least {needed} points, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("Invalid close price {close} on {date}: prices must be strictly positive")]
    NonPositivePrice { date: NaiveDate, close: f64 },
}

/// Failure to produce one named output artifact.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write {artifact}: {source}")]
    Write {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {artifact}: {message}")]
    Serialize { artifact: String, message: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
