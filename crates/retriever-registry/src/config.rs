//! Retriever settings: where scripts live and where upstream is.
//!
//! Settings come from `<home>/retriever.toml` when present, otherwise from
//! defaults. `<home>` is `$RETRIEVER_HOME`, else `$HOME/.retriever`.
//!
//! ```toml
//! system_version = "2.1.0"
//! repository = "https://raw.githubusercontent.com/weecology/retriever/master/"
//! search_paths = ["/home/me/.retriever/scripts", "scripts"]
//! write_path = "/home/me/.retriever/scripts"
//! max_listed = 100
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::{Version, SYSTEM_VERSION};

/// Raw script repository; script artifacts live under `scripts/`.
pub const DEFAULT_REPOSITORY: &str = "https://raw.githubusercontent.com/weecology/retriever/master/";

/// Code-search endpoint; `{query}` is replaced by the search term.
pub const DEFAULT_SEARCH_URL: &str =
    "https://api.github.com/search/code?q={query}+in:file+path:scripts+repo:weecology/retriever";

/// Settings file name inside the retriever home.
pub const CONFIG_FILE: &str = "retriever.toml";

/// Upper bound on names listed from the upstream manifest.
pub const DEFAULT_MAX_LISTED: usize = 100;

/// Environment variable overriding the retriever home.
pub const HOME_ENV: &str = "RETRIEVER_HOME";

/// Runtime settings for the registry and upstream resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Version scripts are gated against.
    pub system_version: String,
    /// Base URL of the upstream script repository (trailing slash).
    pub repository: String,
    /// Code-search URL template.
    pub search_url: String,
    /// Script directories in priority order (first wins).
    pub search_paths: Vec<PathBuf>,
    /// Writable script cache; receives upstream downloads.
    pub write_path: PathBuf,
    /// Maximum number of names listed from the upstream manifest.
    pub max_listed: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::for_home(&home_dir())
    }
}

impl Settings {
    /// Defaults rooted at `home`: user scripts first, then `./scripts`.
    pub fn for_home(home: &Path) -> Self {
        let user_scripts = home.join("scripts");
        Settings {
            system_version: SYSTEM_VERSION.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            search_paths: vec![user_scripts.clone(), PathBuf::from("scripts")],
            write_path: user_scripts,
            max_listed: DEFAULT_MAX_LISTED,
        }
    }

    /// Parse settings from TOML. Missing fields take their defaults.
    pub fn parse(input: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(input)?;
        if !settings.repository.ends_with('/') {
            settings.repository.push('/');
        }
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `<home>/retriever.toml` if it exists, else use defaults.
    pub fn discover() -> Result<Self> {
        let home = home_dir();
        let path = home.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::for_home(&home))
        }
    }

    /// The parsed system version.
    pub fn version(&self) -> Result<Version> {
        Version::parse(&self.system_version)
    }
}

/// The retriever home directory.
pub fn home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".retriever"))
        .unwrap_or_else(|| PathBuf::from(".retriever"))
}
