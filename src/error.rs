//! Error types for the ranking engine.
//!
//! Library modules return these typed errors; the binary wraps them with
//! `anyhow` context at the boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected input, raised before any search call is issued.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "Invalid grid size '{0}': expected '<rows>x<cols>' with both values between 1 and {max}",
        max = crate::models::MAX_GRID_DIMENSION
    )]
    GridSize(String),

    #[error("Radius must be a finite number greater than 0, got {0}")]
    Radius(f64),

    #[error("Latitude must be strictly between -90 and 90, got {0}")]
    Latitude(f64),

    #[error("Longitude must be between -180 and 180, got {0}")]
    Longitude(f64),

    #[error("Unknown distance unit '{0}': expected 'kilometers' or 'miles'")]
    Unit(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Failure of a single nearby-search call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Worth retrying: timeouts, connection errors, 429/5xx, provider throttling.
    #[error("Transient search failure: {0}")]
    Transient(String),

    /// Not worth retrying: bad key, bad request, unparseable body.
    #[error("Search failed: {0}")]
    Permanent(String),
}

impl SearchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::Transient(_))
    }
}

/// Failure of a whole tracking run.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Every grid point failed; distinct from "nobody ranks here".
    #[error("All {points} grid point searches failed (last error: {last_error})")]
    AllPointsFailed { points: usize, last_error: String },
}

/// Failure reading or writing the snapshot history file.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt history record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("History worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Snapshot for '{keyword_id}' at {timestamp} is older than the latest recorded one")]
    OutOfOrder {
        keyword_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}
