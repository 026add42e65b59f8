//! Declarative dataset scripts (JSON data packages).
//!
//! A data package names a dataset and lists where its raw files live:
//! ```json
//! {
//!   "name": "iris",
//!   "title": "Iris flower dataset",
//!   "keywords": ["plants", "observational"],
//!   "licenses": [{"name": "CC0-1.0"}],
//!   "version": "1.0.3",
//!   "retriever_minimum_version": "2.0.dev",
//!   "urls": {"iris": "http://example.org/iris.data"},
//!   "resources": [{"name": "iris", "url": "http://example.org/iris.data"}]
//! }
//! ```
//! Only the fields needed to identify, gate, and download a dataset are read;
//! table schemas and dialects are left to the engine.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use retriever_engine::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{DownloadStep, ScriptDescriptor, ScriptFailure, ScriptKind};
use crate::error::{RegistryError, Result};

/// A parsed data package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPackage {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub licenses: Vec<License>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub retriever_minimum_version: Option<String>,
    /// Table name → raw file URL.
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A license entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum License {
    Named {
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
    Bare(String),
}

impl License {
    pub fn name(&self) -> &str {
        match self {
            License::Named { name, .. } => name,
            License::Bare(name) => name,
        }
    }
}

/// A data resource (one table or file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DataPackage {
    /// Parse a data package from raw bytes read at `path`.
    pub fn from_slice(data: &[u8], path: &Path) -> Result<Self> {
        let invalid = |detail: String| RegistryError::InvalidScript {
            path: path.to_path_buf(),
            detail,
        };

        let package: DataPackage = serde_json::from_slice(data).map_err(|e| invalid(e.to_string()))?;
        if package.name.trim().is_empty() {
            return Err(invalid("name is required".to_string()));
        }
        Ok(package)
    }

    /// Load a data package from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_slice(&data, path)
    }

    /// Raw files to fetch, as `(filename, url)` pairs in a stable order.
    ///
    /// Entries in `urls` come first, then resource URLs not already listed.
    pub fn downloads(&self) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        let listed = self.urls.iter().map(|(table, url)| (Some(table.as_str()), url.as_str()));
        let resources = self
            .resources
            .iter()
            .filter_map(|r| r.url.as_deref().map(|url| (r.name.as_deref(), url)));

        for (table, url) in listed.chain(resources) {
            if url.trim().is_empty() || !seen.insert(url.to_string()) {
                continue;
            }
            let filename = file_name_from_url(url)
                .or_else(|| table.map(str::to_string))
                .unwrap_or_else(|| format!("{}-{}", self.name, files.len()));
            files.push((filename, url.to_string()));
        }
        files
    }

    /// Turn this package into a registry descriptor.
    pub fn into_descriptor(self) -> ScriptDescriptor {
        let mut descriptor =
            ScriptDescriptor::new(self.name.clone(), ScriptKind::Declarative, Arc::new(self.clone()));
        descriptor.title = self.title;
        descriptor.description = self.description;
        descriptor.keywords = self.keywords;
        descriptor.licenses = self.licenses.iter().map(|l| l.name().to_string()).collect();
        descriptor.version = self.version;
        descriptor.minimum_version = self.retriever_minimum_version;
        descriptor
    }
}

impl DownloadStep for DataPackage {
    fn download(
        &self,
        engine: &mut dyn Engine,
        debug: bool,
    ) -> std::result::Result<(), ScriptFailure> {
        let files = self.downloads();
        if files.is_empty() {
            debug!(script = %self.name, "data package lists no raw files");
        }
        for (filename, url) in files {
            let stored = engine.fetch(&url, &filename)?;
            if debug {
                debug!(script = %self.name, url, path = %stored.display(), "fetched");
            }
        }
        Ok(())
    }
}

/// Last path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let (_, path) = after_scheme.split_once('/')?;
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
