//! Upstream script repository: single-script fetch, search, and listing.
//!
//! Remote layout, relative to the repository URL:
//! ```text
//! scripts/<name_with_underscores>.json   # one data package per dataset
//! version.txt                            # header line, then `file,version` lines
//! ```
//! Keyword and license search goes through a code-search endpoint answering
//! `{"total_count": N, "items": [{"name": "bird_size.json"}, ...]}`.
//!
//! A 404 for a script is a normal "not found" answer. Every other failure is
//! surfaced as [`RegistryError::Retrieval`] and never retried here.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use retriever_engine::{Response, Transport};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Settings, DEFAULT_MAX_LISTED, DEFAULT_SEARCH_URL};
use crate::descriptor::{Provenance, ScriptDescriptor};
use crate::error::{RegistryError, Result};
use crate::integrity::ContentHash;
use crate::package::DataPackage;

/// One line of the upstream manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Dataset name (hyphenated).
    pub name: String,
    /// Script file name in the repository.
    pub file: String,
    /// Script version, when listed.
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
}

/// Client for the upstream script repository.
pub struct UpstreamResolver {
    repository: String,
    search_url: String,
    write_path: PathBuf,
    max_listed: usize,
    transport: Arc<dyn Transport>,
}

impl UpstreamResolver {
    /// Create a resolver for `repository`, caching fetched scripts in `write_path`.
    pub fn new(
        repository: impl Into<String>,
        write_path: PathBuf,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut repository = repository.into();
        if !repository.ends_with('/') {
            repository.push('/');
        }
        UpstreamResolver {
            repository,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            write_path,
            max_listed: DEFAULT_MAX_LISTED,
            transport,
        }
    }

    /// Create a resolver from settings.
    pub fn from_settings(settings: &Settings, transport: Arc<dyn Transport>) -> Self {
        UpstreamResolver::new(
            settings.repository.clone(),
            settings.write_path.clone(),
            transport,
        )
        .with_search_url(settings.search_url.clone())
        .with_max_listed(settings.max_listed)
    }

    /// Override the code-search URL template (`{query}` placeholder).
    pub fn with_search_url(mut self, template: impl Into<String>) -> Self {
        self.search_url = template.into();
        self
    }

    /// Override the manifest listing limit.
    pub fn with_max_listed(mut self, max_listed: usize) -> Self {
        self.max_listed = max_listed;
        self
    }

    pub fn write_path(&self) -> &Path {
        &self.write_path
    }

    /// Remote URL of the script for `dataset`.
    pub fn script_url(&self, dataset: &str) -> String {
        format!("{}scripts/{}.json", self.repository, remote_name(dataset))
    }

    /// Fetch the script for `dataset`.
    ///
    /// Returns `Ok(None)` when the repository has no such script. On success
    /// the artifact is stored in the script cache before it is parsed. A name
    /// that is not a single file stem is an unknown dataset and never leaves
    /// this process.
    pub fn fetch_by_name(&self, dataset: &str) -> Result<Option<ScriptDescriptor>> {
        let stem = remote_name(dataset);
        if !is_file_stem(&stem) {
            return Err(RegistryError::UnknownDataset {
                pattern: dataset.to_string(),
            });
        }
        let url = self.script_url(dataset);

        let response = self.get(&url)?;
        if response.is_not_found() {
            debug!(dataset, url, "no upstream script");
            return Ok(None);
        }
        let response = ensure_success(&url, response)?;

        let target = self.write_path.join(format!("{stem}.json"));
        persist(&target, &response.body)?;
        info!(dataset, path = %target.display(), "fetched upstream script");

        let package = DataPackage::from_slice(&response.body, &target)?;
        let descriptor = package.into_descriptor().with_source(Provenance {
            location: target.display().to_string(),
            file_stem: stem,
            digest: ContentHash::compute(&response.body),
        });
        Ok(Some(descriptor))
    }

    /// Every script listed in the remote manifest, in manifest order.
    pub fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let url = format!("{}version.txt", self.repository);
        let response = ensure_success(&url, self.get(&url)?)?;
        Ok(parse_manifest(&response.text()))
    }

    /// Dataset names matching any of `keywords` or `licenses`, sorted.
    ///
    /// Issues one search request per term. With no terms, lists up to
    /// `max_listed` names from the manifest instead.
    pub fn search(&self, keywords: &[String], licenses: &[String]) -> Result<Vec<String>> {
        if keywords.is_empty() && licenses.is_empty() {
            let mut names: Vec<String> = self
                .manifest()?
                .into_iter()
                .take(self.max_listed)
                .map(|entry| entry.name)
                .collect();
            names.sort();
            return Ok(names);
        }

        let mut found = BTreeSet::new();
        for term in licenses.iter().chain(keywords) {
            let term = term.trim().to_lowercase();
            if term.is_empty() {
                continue;
            }
            let url = self.search_url.replace("{query}", &encode_query(&term));
            let response = ensure_success(&url, self.get(&url)?)?;
            let results: SearchResponse =
                serde_json::from_slice(&response.body).map_err(|e| RegistryError::Retrieval {
                    url: url.clone(),
                    status: Some(response.status),
                    detail: format!("unreadable search response: {e}"),
                })?;
            debug!(term, hits = results.items.len(), "upstream search");
            found.extend(results.items.iter().map(|item| dataset_name(&item.name)));
        }
        Ok(found.into_iter().collect())
    }

    fn get(&self, url: &str) -> Result<Response> {
        self.transport.get(url).map_err(|e| RegistryError::Retrieval {
            url: url.to_string(),
            status: None,
            detail: e.to_string(),
        })
    }
}

impl std::fmt::Debug for UpstreamResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResolver")
            .field("repository", &self.repository)
            .field("write_path", &self.write_path)
            .finish_non_exhaustive()
    }
}

/// Repository file stem for a dataset name (`bird-size` → `bird_size`).
pub fn remote_name(dataset: &str) -> String {
    dataset.trim().replace('-', "_")
}

/// Whether `stem` names one file directly inside a directory.
fn is_file_stem(stem: &str) -> bool {
    let mut components = Path::new(stem).components();
    !stem.contains(['/', '\\'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
}

/// Dataset name for a repository file (`bird_size.json` → `bird-size`).
pub fn dataset_name(file: &str) -> String {
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file,
    };
    stem.replace('_', "-").to_lowercase()
}

fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.trim().split(',');
            let file = fields.next()?.trim();
            if file.is_empty() {
                return None;
            }
            let version = fields
                .next()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            Some(ManifestEntry {
                name: dataset_name(file),
                file: file.to_string(),
                version,
            })
        })
        .collect()
}

fn ensure_success(url: &str, response: Response) -> Result<Response> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(RegistryError::Retrieval {
            url: url.to_string(),
            status: Some(response.status),
            detail: format!("HTTP {}", response.status),
        })
    }
}

fn persist(target: &Path, data: &[u8]) -> Result<()> {
    let cache_err = |e: std::io::Error| RegistryError::CacheError {
        path: target.to_path_buf(),
        detail: format!("writing script: {e}"),
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(cache_err)?;
    }
    let mut file = File::create(target).map_err(cache_err)?;
    file.write_all(data).map_err(cache_err)?;
    file.flush().map_err(cache_err)
}

/// Percent-encode a search term for use in a query string.
fn encode_query(term: &str) -> String {
    let mut encoded = String::with_capacity(term.len());
    for byte in term.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}
