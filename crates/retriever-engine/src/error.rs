//! Engine and transport error types.

use std::path::PathBuf;

/// Errors raised by a transport while retrieving a URL.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Network access is disabled for this run.
    #[error("network access is disabled; cannot retrieve {url}")]
    Offline { url: String },

    /// The transport could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors raised by an engine while running a download step.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Retrieval of a raw file failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote answered with a non-success status.
    #[error("downloading {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// A file name would escape the engine's output directory.
    #[error("invalid file name '{name}'")]
    InvalidFileName { name: String },

    /// Writing output failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
