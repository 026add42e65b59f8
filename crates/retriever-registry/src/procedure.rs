//! Compiled-in procedure scripts and the `.proc` stubs that enable them.
//!
//! Executable scripts are not loaded at runtime. Each implementation is
//! registered in a [`ProcedureTable`] under a name, and a search path opts a
//! procedure in by containing a stub file whose first two lines carry the
//! `#retriever` marker:
//!
//! ```toml
//! #retriever
//! # Breeding Bird Survey, 50 stop data
//! name = "breed-bird-survey-50stop"
//! procedure = "url_list"
//! minimum_version = "2.0.0"
//!
//! [params.files]
//! "fifty1.zip" = "https://example.org/50-StopData/1997ToPresent/Fifty1.zip"
//! ```
//!
//! The stub body is TOML; the marker lines are plain comments. `procedure`
//! and `name` both default to the file stem.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::builtin;
use crate::descriptor::{BoxError, DownloadStep, ScriptDescriptor, ScriptKind};

/// Marker that must appear in the first two lines of a stub.
pub const MARKER: &str = "#retriever";

/// File extension of procedure stubs.
pub const STUB_EXTENSION: &str = "proc";

/// Builds a download step from a stub's parameters.
pub type ProcedureFactory = fn(&ProcedureStub) -> Result<Arc<dyn DownloadStep>, BoxError>;

/// Errors raised while turning a stub into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("no procedure registered as '{procedure}'")]
    Unregistered { procedure: String },

    #[error("stub is not valid TOML: {0}")]
    Stub(#[from] toml::de::Error),

    #[error("procedure '{procedure}' rejected its parameters: {source}")]
    Factory {
        procedure: String,
        #[source]
        source: BoxError,
    },

    #[error("reading stub failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of a `.proc` stub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcedureStub {
    #[serde(default)]
    pub procedure: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub minimum_version: Option<String>,
    /// Procedure-specific parameters.
    #[serde(default)]
    pub params: toml::Table,
}

impl ProcedureStub {
    pub fn parse(input: &str) -> Result<Self, ProcedureError> {
        Ok(toml::from_str(input)?)
    }
}

/// Registered procedures, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct ProcedureTable {
    entries: BTreeMap<String, ProcedureFactory>,
}

impl ProcedureTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the procedures shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        builtin::register(&mut table);
        table
    }

    /// Register `factory` under `name`, returning any factory it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: ProcedureFactory,
    ) -> Option<ProcedureFactory> {
        self.entries.insert(name.into().to_lowercase(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Registered procedure names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Build a descriptor from a parsed stub found under `file_stem`.
    pub fn instantiate(
        &self,
        file_stem: &str,
        stub: &ProcedureStub,
    ) -> Result<ScriptDescriptor, ProcedureError> {
        let procedure = stub.procedure.as_deref().unwrap_or(file_stem);
        let factory = self
            .entries
            .get(&procedure.to_lowercase())
            .ok_or_else(|| ProcedureError::Unregistered {
                procedure: procedure.to_string(),
            })?;

        let step = factory(stub).map_err(|source| ProcedureError::Factory {
            procedure: procedure.to_string(),
            source,
        })?;

        let name = stub.name.clone().unwrap_or_else(|| file_stem.to_string());
        let mut descriptor = ScriptDescriptor::new(name, ScriptKind::Procedure, step);
        descriptor.title = stub.title.clone();
        descriptor.description = stub.description.clone();
        descriptor.keywords = stub.keywords.clone();
        descriptor.licenses = stub.licenses.clone();
        descriptor.version = stub.version.clone();
        descriptor.minimum_version = stub.minimum_version.clone();
        Ok(descriptor)
    }
}

impl std::fmt::Debug for ProcedureTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Whether one of the first two lines of `path` contains the [`MARKER`].
///
/// Case is ignored but whitespace is not: `# retriever` is an ordinary comment.
pub fn has_marker(path: &Path) -> std::io::Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines().take(2) {
        if line?.to_lowercase().contains(MARKER) {
            return Ok(true);
        }
    }
    Ok(false)
}
