//! Error types shared by the ingestion job, the API layer and the dashboard
//! client.

use reqwest::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

/// Coarse classification used in logs and in `sync_status.last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Validation,
    Persistence,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

/// Failure talking to the upstream price feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited by upstream on {endpoint}")]
    RateLimited { endpoint: String },

    #[error("upstream returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("malformed payload from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

/// A raw record that cannot become an asset row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for field `{0}`")]
    InvalidField(&'static str),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("no valid records: {0}")]
    Validation(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbErr),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Feed(_) => ErrorKind::Network,
            IngestError::Validation(_) => ErrorKind::Validation,
            IngestError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Failure fetching from the API layer, as seen by the dashboard client.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("could not reach API: {0}")]
    Network(String),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },
}
