//! Registry error types.

use std::path::PathBuf;

use crate::descriptor::ScriptFailure;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No script matched the requested dataset, locally or upstream.
    #[error(
        "no dataset matched '{pattern}'; run `retriever ls` to see the list of currently available datasets"
    )]
    UnknownDataset { pattern: String },

    /// The dataset pattern could not be compiled.
    #[error("invalid dataset pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    /// A script definition could not be read.
    #[error("invalid script {}: {detail}", path.display())]
    InvalidScript { path: PathBuf, detail: String },

    /// The remote repository answered with an error or could not be reached.
    #[error("retrieval of {url} failed: {detail}")]
    Retrieval {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    /// A script's download step aborted the run.
    #[error("script '{name}' failed: {source}")]
    ScriptExecution {
        name: String,
        #[source]
        source: ScriptFailure,
    },

    /// The engine could not be constructed or finalized.
    #[error("engine error: {0}")]
    Engine(#[from] retriever_engine::EngineError),

    /// Script cache I/O error.
    #[error("cache error at {}: {detail}", path.display())]
    CacheError { path: PathBuf, detail: String },

    /// Version string could not be parsed.
    #[error("invalid version '{input}': {detail}")]
    InvalidVersion { input: String, detail: String },

    /// Configuration file could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether this error means "no such dataset" rather than a failure.
    pub fn is_unknown_dataset(&self) -> bool {
        matches!(self, RegistryError::UnknownDataset { .. })
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
