use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Errors that can occur while importing campaigns and reports
#[derive(Error, Debug)]
pub enum SyncError {
    /// Tracking key does not match the `YYYY_mmmD_segment` grammar
    #[error("malformed tracking key: {0}")]
    MalformedKey(String),

    /// Tracking key parsed, but the month token is not a known 3-letter abbreviation
    #[error("unknown month token in tracking key: {0}")]
    UnknownMonth(String),

    /// Caller asked to persist into an unrecognized import target
    #[error("invalid import kind: {0}")]
    InvalidImportKind(String),

    /// A task inside a concurrency window failed; the whole window is rejected
    #[error("batch window {window} failed: {source}")]
    BatchWindowFailure {
        window: usize,
        #[source]
        source: Box<SyncError>,
    },

    /// A window task panicked or was cancelled before producing a result
    #[error("batch task panicked: {0}")]
    TaskPanic(String),

    /// Site name not present in the configured site -> list mapping
    #[error("unknown site: {0}")]
    UnknownSite(String),

    /// Provider responded with a non-success status after retries were exhausted
    #[error("provider returned {status} for {url}")]
    Provider { status: u16, url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Report lookup was asked for a campaign id that is not in the store
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
