//! Per-invocation state: settings, transport, and the shared script registry.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use retriever_engine::{HttpTransport, OfflineTransport, Transport};
use retriever_registry::{
    Downloader, FileEngineFactory, ScriptLoader, ScriptRegistry, Settings, UpstreamResolver,
};
use tracing::debug;

pub struct Session {
    pub settings: Settings,
    pub loader: ScriptLoader,
    pub registry: Arc<ScriptRegistry>,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Load settings (from `config` or the retriever home) and set up a session.
    pub fn open(config: Option<&Path>, offline: bool) -> Result<Self> {
        let settings = match config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("reading settings from {}", path.display()))?,
            None => Settings::discover().context("reading retriever settings")?,
        };
        debug!(
            offline,
            write_path = %settings.write_path.display(),
            search_paths = settings.search_paths.len(),
            "settings loaded"
        );
        let transport: Arc<dyn Transport> = if offline {
            Arc::new(OfflineTransport)
        } else {
            Arc::new(HttpTransport::new()?)
        };
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Result<Self> {
        let loader = ScriptLoader::from_settings(&settings)
            .context("invalid system_version in settings")?;
        let registry = Arc::new(ScriptRegistry::new(loader.clone()));
        Ok(Session {
            settings,
            loader,
            registry,
            transport,
        })
    }

    pub fn upstream(&self) -> UpstreamResolver {
        UpstreamResolver::from_settings(&self.settings, self.transport.clone())
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(
            self.registry.clone(),
            FileEngineFactory::new(self.transport.clone()),
        )
        .with_upstream(self.upstream())
    }
}
