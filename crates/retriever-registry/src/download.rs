//! Download workflow: resolve a dataset argument, then run each matching
//! script against one engine.
//!
//! A run goes through three phases:
//! 1. **Resolving**: build the engine, match the argument against the
//!    registry, and fall back to upstream for a plain name.
//! 2. **Executing**: run scripts one after another. A recoverable failure is
//!    recorded and the run moves on, unless in debug mode. A fatal failure
//!    always ends the run.
//! 3. **Finalized**: hand the engine and per-script reports back.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use retriever_engine::{Engine, FileEngine, Transport};
use tracing::{debug, error, info};

use crate::descriptor::{ScriptDescriptor, ScriptFailure};
use crate::error::{RegistryError, Result};
use crate::matcher::{is_plain_name, name_matches};
use crate::registry::ScriptRegistry;
use crate::upstream::UpstreamResolver;

/// Parameters of one download run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Dataset name, `all`, or a glob.
    pub dataset: String,
    /// Base output directory.
    pub path: PathBuf,
    /// Optional directory below `path`.
    pub sub_dir: Option<String>,
    /// Suppress per-script progress output.
    pub quiet: bool,
    /// Reuse raw files downloaded earlier.
    pub use_cache: bool,
    /// Abort on the first failing script.
    pub debug: bool,
}

impl DownloadRequest {
    pub fn new(dataset: impl Into<String>) -> Self {
        DownloadRequest {
            dataset: dataset.into(),
            path: PathBuf::from("./"),
            sub_dir: None,
            quiet: false,
            use_cache: true,
            debug: false,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn sub_dir(mut self, sub_dir: impl Into<String>) -> Self {
        self.sub_dir = Some(sub_dir.into());
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Directory the engine writes into: `path`, or `path/sub_dir`.
    pub fn output_dir(&self) -> PathBuf {
        match &self.sub_dir {
            Some(sub_dir) if !sub_dir.is_empty() => self.path.join(sub_dir),
            _ => self.path.clone(),
        }
    }
}

/// Builds the engine a download run targets.
pub trait EngineFactory: Send + Sync {
    fn create(&self, request: &DownloadRequest) -> Result<Box<dyn Engine>>;
}

/// Factory for [`FileEngine`]s writing to the request's output directory.
pub struct FileEngineFactory {
    transport: Arc<dyn Transport>,
}

impl FileEngineFactory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        FileEngineFactory { transport }
    }
}

impl EngineFactory for FileEngineFactory {
    fn create(&self, request: &DownloadRequest) -> Result<Box<dyn Engine>> {
        Ok(Box::new(FileEngine::new(
            request.output_dir(),
            self.transport.clone(),
        )))
    }
}

/// How one script's download ended.
#[derive(Debug)]
pub enum ScriptOutcome {
    Completed,
    Failed(ScriptFailure),
}

/// Outcome of one script within a run.
#[derive(Debug)]
pub struct ScriptReport {
    pub name: String,
    pub outcome: ScriptOutcome,
}

impl ScriptReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ScriptOutcome::Completed)
    }
}

/// Result of a finished run: the engine and one report per script.
pub struct DownloadRun {
    pub engine: Box<dyn Engine>,
    pub reports: Vec<ScriptReport>,
}

impl DownloadRun {
    /// Names of scripts that completed.
    pub fn succeeded(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Reports of scripts that failed recoverably.
    pub fn failed(&self) -> Vec<&ScriptReport> {
        self.reports.iter().filter(|r| !r.is_success()).collect()
    }
}

impl fmt::Debug for DownloadRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRun")
            .field("engine", &self.engine.name())
            .field("reports", &self.reports)
            .finish()
    }
}

/// Runs dataset downloads against the shared registry.
pub struct Downloader {
    registry: Arc<ScriptRegistry>,
    engines: Box<dyn EngineFactory>,
    upstream: Option<UpstreamResolver>,
}

impl Downloader {
    pub fn new(registry: Arc<ScriptRegistry>, engines: impl EngineFactory + 'static) -> Self {
        Downloader {
            registry,
            engines: Box::new(engines),
            upstream: None,
        }
    }

    /// Allow plain names missing locally to be fetched from upstream.
    pub fn with_upstream(mut self, upstream: UpstreamResolver) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    /// Scripts selected by `pattern`; never empty on success.
    pub fn resolve(&self, pattern: &str) -> Result<Vec<ScriptDescriptor>> {
        let scripts = self.registry.get()?;
        let matched = name_matches(&scripts, pattern)?;
        if !matched.is_empty() {
            return Ok(matched);
        }

        if let Some(upstream) = &self.upstream {
            if is_plain_name(pattern) {
                debug!(dataset = pattern.trim(), "no local script, trying upstream");
                if let Some(script) = upstream.fetch_by_name(pattern.trim())? {
                    return Ok(vec![script]);
                }
            }
        }

        Err(RegistryError::UnknownDataset {
            pattern: pattern.trim().to_string(),
        })
    }

    /// Run every script selected by `request.dataset`.
    ///
    /// Recoverable script failures are reported in the returned run. In debug
    /// mode the first failure, and in any mode a fatal failure, aborts with
    /// [`RegistryError::ScriptExecution`].
    pub fn run(&self, request: &DownloadRequest) -> Result<DownloadRun> {
        debug!(dataset = %request.dataset, "resolving");
        let mut engine = self.engines.create(request)?;
        engine.set_use_cache(request.use_cache);
        let scripts = self.resolve(&request.dataset)?;

        debug!(scripts = scripts.len(), engine = engine.name(), "executing");
        let mut reports = Vec::with_capacity(scripts.len());
        for script in &scripts {
            if !request.quiet {
                info!("=> Downloading {}", script.name);
            }

            let result = script
                .download(engine.as_mut(), request.debug)
                .and_then(|()| engine.final_cleanup().map_err(ScriptFailure::from));

            let outcome = match result {
                Ok(()) => ScriptOutcome::Completed,
                Err(failure) => {
                    error!("{}: {failure}", script.name);
                    if request.debug || failure.is_fatal() {
                        return Err(RegistryError::ScriptExecution {
                            name: script.name.clone(),
                            source: failure,
                        });
                    }
                    ScriptOutcome::Failed(failure)
                }
            };
            reports.push(ScriptReport {
                name: script.name.clone(),
                outcome,
            });
        }

        debug!(
            completed = reports.iter().filter(|r| r.is_success()).count(),
            failed = reports.iter().filter(|r| !r.is_success()).count(),
            "finalized"
        );
        Ok(DownloadRun { engine, reports })
    }
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("registry", &self.registry)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}
