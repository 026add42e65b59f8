//! Process-wide cache of the currently known scripts.
//!
//! The registry starts empty and is populated on first use from its
//! [`ScriptSource`]. Later reads return the same cached set until it is
//! replaced with [`ScriptRegistry::set`] or [`ScriptRegistry::reload`], or
//! dropped with [`ScriptRegistry::reset`]. Replacement swaps the whole set;
//! readers holding the previous `Arc` keep a consistent view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::descriptor::ScriptDescriptor;
use crate::error::Result;

/// Anything able to produce a fresh set of scripts.
pub trait ScriptSource: Send + Sync {
    fn load_scripts(&self) -> Result<Vec<ScriptDescriptor>>;
}

/// Shared, lazily populated script set.
pub struct ScriptRegistry {
    source: Box<dyn ScriptSource>,
    current: Mutex<Option<Arc<[ScriptDescriptor]>>>,
}

impl ScriptRegistry {
    /// Create an unpopulated registry backed by `source`.
    pub fn new(source: impl ScriptSource + 'static) -> Self {
        ScriptRegistry {
            source: Box::new(source),
            current: Mutex::new(None),
        }
    }

    /// The cached scripts, loading them on first use.
    ///
    /// Concurrent first callers are serialized: one loads, the others wait
    /// and then observe the loaded set.
    pub fn get(&self) -> Result<Arc<[ScriptDescriptor]>> {
        let mut current = self.lock();
        if let Some(scripts) = current.as_ref() {
            return Ok(Arc::clone(scripts));
        }

        let scripts: Arc<[ScriptDescriptor]> = self.source.load_scripts()?.into();
        debug!(count = scripts.len(), "script registry populated");
        *current = Some(Arc::clone(&scripts));
        Ok(scripts)
    }

    /// Replace the cached set. Later duplicates of a name are dropped.
    pub fn set(&self, scripts: Vec<ScriptDescriptor>) -> Arc<[ScriptDescriptor]> {
        let scripts: Arc<[ScriptDescriptor]> = dedup(scripts).into();
        *self.lock() = Some(Arc::clone(&scripts));
        scripts
    }

    /// Rescan the source and replace the cached set with the result.
    ///
    /// On failure the previous set stays in place.
    pub fn reload(&self) -> Result<Arc<[ScriptDescriptor]>> {
        let scripts = self.source.load_scripts()?;
        Ok(self.set(scripts))
    }

    /// Forget the cached set; the next `get` loads again.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    /// Whether a set is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Case-insensitive lookup by exact name.
    pub fn find(&self, name: &str) -> Result<Option<ScriptDescriptor>> {
        Ok(self.get()?.iter().find(|s| s.is_named(name)).cloned())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<[ScriptDescriptor]>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded = self.lock().as_ref().map(|s| s.len());
        f.debug_struct("ScriptRegistry")
            .field("loaded", &loaded)
            .finish_non_exhaustive()
    }
}

fn dedup(scripts: Vec<ScriptDescriptor>) -> Vec<ScriptDescriptor> {
    let mut seen = HashSet::new();
    scripts
        .into_iter()
        .filter(|s| {
            let fresh = seen.insert(s.key());
            if !fresh {
                warn!(script = %s.name, "dropping duplicate script name");
            }
            fresh
        })
        .collect()
}
