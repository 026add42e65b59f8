//! Single-script lookup across the local registry and upstream.

use tracing::debug;

use crate::descriptor::ScriptDescriptor;
use crate::error::{RegistryError, Result};
use crate::registry::ScriptRegistry;
use crate::upstream::UpstreamResolver;

/// Look up one script by exact name.
///
/// The local registry is consulted first. When it has no such script and an
/// upstream resolver is given, the script is fetched (and cached) from there.
pub fn get_script(
    registry: &ScriptRegistry,
    upstream: Option<&UpstreamResolver>,
    name: &str,
) -> Result<ScriptDescriptor> {
    if let Some(script) = registry.find(name)? {
        return Ok(script);
    }

    if let Some(upstream) = upstream {
        debug!(name, "not available locally, asking upstream");
        if let Some(script) = upstream.fetch_by_name(name)? {
            return Ok(script);
        }
    }

    Err(RegistryError::UnknownDataset {
        pattern: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use retriever_engine::{Engine, Response, Transport, TransportError};

    use crate::descriptor::{DownloadStep, ScriptFailure, ScriptKind};
    use crate::registry::ScriptSource;

    struct Noop;

    impl DownloadStep for Noop {
        fn download(
            &self,
            _engine: &mut dyn Engine,
            _debug: bool,
        ) -> std::result::Result<(), ScriptFailure> {
            Ok(())
        }
    }

    struct Fixed(Vec<&'static str>);

    impl ScriptSource for Fixed {
        fn load_scripts(&self) -> Result<Vec<ScriptDescriptor>> {
            Ok(self
                .0
                .iter()
                .map(|name| ScriptDescriptor::new(*name, ScriptKind::Declarative, Arc::new(Noop)))
                .collect())
        }
    }

    struct OneScript;

    impl Transport for OneScript {
        fn get(&self, url: &str) -> std::result::Result<Response, TransportError> {
            if url.ends_with("scripts/bird_size.json") {
                Ok(Response::new(200, r#"{"name": "bird-size"}"#))
            } else {
                Ok(Response::new(404, "Not Found"))
            }
        }
    }

    #[test]
    fn local_script_found() {
        let registry = ScriptRegistry::new(Fixed(vec!["iris"]));
        assert_eq!(get_script(&registry, None, "IRIS").unwrap().name, "iris");
    }

    #[test]
    fn missing_without_upstream_is_unknown() {
        let registry = ScriptRegistry::new(Fixed(vec!["iris"]));
        let err = get_script(&registry, None, "bird-size").unwrap_err();
        assert!(err.is_unknown_dataset());
        assert!(err.to_string().contains("retriever ls"));
    }

    #[test]
    fn upstream_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ScriptRegistry::new(Fixed(vec!["iris"]));
        let upstream = UpstreamResolver::new(
            "https://repo.test/",
            dir.path().to_path_buf(),
            Arc::new(OneScript),
        );

        let script = get_script(&registry, Some(&upstream), "bird-size").unwrap();
        assert_eq!(script.name, "bird-size");
        assert!(dir.path().join("bird_size.json").exists());

        let err = get_script(&registry, Some(&upstream), "nope").unwrap_err();
        assert!(err.is_unknown_dataset());
    }
}
