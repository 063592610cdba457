//! Error types for catalog jobs.
//!
//! Every variant here is fatal for the job that raised it. Per-entry
//! problems (a song that cannot be matched, a malformed script line) are
//! logged and skipped by the jobs themselves and never surface as an `Error`.

use thiserror::Error;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is not set
    #[error("missing configuration value: {0}")]
    MissingConfiguration(String),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Request could not be sent or the body could not be read
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Upstream payload did not match the expected shape
    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Music.xml could not be parsed
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Game data dump entry is missing a required field
    #[error("malformed dump entry {path}: {reason}")]
    Dump { path: String, reason: String },

    /// Some dump directories could not be imported
    #[error("{failed} of {total} dump directories failed")]
    DumpFailed { failed: usize, total: usize },

    /// Worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
