use thiserror::Error;

/// Errors raised by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded writing {key}: need {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("No GitHub credential is configured")]
    NoCredential,

    #[error("GitHub rejected the credential; sign in again")]
    InvalidCredential,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    QuotaExceeded { reset_at: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("GitHub API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Storage exhausted: could not persist {key} after evicting the cache")]
    StorageExhausted { key: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::NetworkError(err.to_string())
    }
}

impl DashboardError {
    /// Transient failures worth retrying without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::NetworkError(_) => true,
            DashboardError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            DashboardError::NoCredential | DashboardError::InvalidCredential
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
