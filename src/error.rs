use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while reading a sensor log.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("log has no `date-time` column")]
    MissingTimestampColumn,

    #[error("unreadable header row: {0}")]
    Header(#[source] csv::Error),

    /// The row could not be split into the expected number of fields
    #[error("row {row}: {source}")]
    Record {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: invalid timestamp `{value}`: {source}")]
    Timestamp {
        row: u64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid window bound `{value}`: {source}")]
    WindowBound {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Reasons a straight line could not be fitted to a window.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FitError {
    #[error("at least 2 points are needed for a linear fit, found {found}")]
    InsufficientPoints { found: usize },

    #[error("{times} times but {values} values")]
    LengthMismatch { times: usize, values: usize },

    #[error("covariance matrix is singular")]
    Singular,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("channel `{0}` not present in the log")]
    UnknownChannel(String),

    #[error("no complete samples left after resampling")]
    EmptySeries,

    #[error("bucket width must be positive")]
    InvalidBucketWidth,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
