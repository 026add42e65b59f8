//! Dataset script registry for the retriever.
//!
//! Finds the dataset scripts available to this installation, keeps them in a
//! shared registry, and runs the ones a user asks for.
//!
//! # Architecture
//!
//! - **Scripts** are either JSON data packages ([`package`]) or compiled-in
//!   procedures enabled by `.proc` stubs ([`procedure`]). Either way they
//!   become a [`ScriptDescriptor`] carrying a download step.
//! - **Loading**: [`ScriptLoader`] scans the search paths in priority order,
//!   shadowing by name and dropping scripts that need a newer system
//!   ([`version`]).
//! - **Registry**: [`ScriptRegistry`] loads once on first use and can be
//!   reloaded or replaced atomically.
//! - **Upstream**: [`UpstreamResolver`] fetches single scripts from the
//!   public repository and answers keyword/license searches.
//! - **Downloads**: [`Downloader`] matches a dataset argument
//!   ([`matcher`]) and runs each script against an engine.

pub mod builtin;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod integrity;
pub mod loader;
pub mod matcher;
pub mod package;
pub mod procedure;
pub mod registry;
pub mod resolve;
pub mod upstream;
pub mod version;

// Re-exports for convenience.
pub use config::Settings;
pub use descriptor::{DownloadStep, Provenance, ScriptDescriptor, ScriptFailure, ScriptKind};
pub use download::{
    DownloadRequest, DownloadRun, Downloader, EngineFactory, FileEngineFactory, ScriptOutcome,
    ScriptReport,
};
pub use error::{RegistryError, Result};
pub use integrity::ContentHash;
pub use loader::{LoadFailure, LoadReport, ScriptLoader};
pub use matcher::{filter_datasets, is_plain_name, name_matches};
pub use package::DataPackage;
pub use procedure::{ProcedureStub, ProcedureTable};
pub use registry::{ScriptRegistry, ScriptSource};
pub use resolve::get_script;
pub use upstream::{ManifestEntry, UpstreamResolver};
pub use version::{is_compatible, Version, SYSTEM_VERSION};
