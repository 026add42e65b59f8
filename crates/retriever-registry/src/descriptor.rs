//! Dataset script descriptors and the download capability they carry.

use std::fmt;
use std::sync::Arc;

use retriever_engine::{Engine, EngineError};

use crate::integrity::ContentHash;

/// Boxed error type carried by script failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a script's download step.
///
/// `Recoverable` failures are reported and the batch moves on unless the run
/// is in debug mode. `Fatal` failures always abort the batch.
#[derive(Debug, thiserror::Error)]
pub enum ScriptFailure {
    #[error("{0}")]
    Recoverable(#[source] BoxError),

    #[error("fatal: {0}")]
    Fatal(#[source] BoxError),
}

impl ScriptFailure {
    /// Wrap any error as a recoverable failure.
    pub fn recoverable(err: impl Into<BoxError>) -> Self {
        ScriptFailure::Recoverable(err.into())
    }

    /// Wrap any error as a fatal failure.
    pub fn fatal(err: impl Into<BoxError>) -> Self {
        ScriptFailure::Fatal(err.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptFailure::Fatal(_))
    }
}

impl From<EngineError> for ScriptFailure {
    fn from(err: EngineError) -> Self {
        ScriptFailure::Recoverable(Box::new(err))
    }
}

/// The executable part of a dataset script.
pub trait DownloadStep: Send + Sync {
    /// Fetch the script's raw data through `engine`.
    fn download(&self, engine: &mut dyn Engine, debug: bool) -> Result<(), ScriptFailure>;
}

/// How a script was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// A JSON data package.
    Declarative,
    /// A compiled-in procedure enabled by a `.proc` stub.
    Procedure,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Declarative => f.write_str("declarative"),
            ScriptKind::Procedure => f.write_str("procedure"),
        }
    }
}

/// Where a descriptor was loaded from. Not part of its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// File path (or URL) the definition was read from.
    pub location: String,
    /// File stem of the definition.
    pub file_stem: String,
    /// SHA-256 of the definition bytes.
    pub digest: ContentHash,
}

/// One dataset script known to the registry.
#[derive(Clone)]
pub struct ScriptDescriptor {
    /// Case-insensitive unique name.
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub licenses: Vec<String>,
    /// Version of the script itself.
    pub version: Option<String>,
    /// Oldest system version able to run this script.
    pub minimum_version: Option<String>,
    pub kind: ScriptKind,
    source: Option<Provenance>,
    step: Arc<dyn DownloadStep>,
}

impl ScriptDescriptor {
    /// Create a descriptor with no metadata beyond its name.
    pub fn new(name: impl Into<String>, kind: ScriptKind, step: Arc<dyn DownloadStep>) -> Self {
        ScriptDescriptor {
            name: name.into(),
            title: None,
            description: None,
            keywords: Vec::new(),
            licenses: Vec::new(),
            version: None,
            minimum_version: None,
            kind,
            source: None,
            step,
        }
    }

    /// Set the minimum system version.
    pub fn with_minimum_version(mut self, minimum: impl Into<String>) -> Self {
        self.minimum_version = Some(minimum.into());
        self
    }

    /// Stamp provenance. Only called while the descriptor is being created.
    pub fn with_source(mut self, source: Provenance) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&Provenance> {
        self.source.as_ref()
    }

    /// Lowercased name used for identity comparisons.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    /// Run this script's download step against `engine`.
    pub fn download(&self, engine: &mut dyn Engine, debug: bool) -> Result<(), ScriptFailure> {
        self.step.download(engine, debug)
    }
}

impl fmt::Debug for ScriptDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("minimum_version", &self.minimum_version)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
