//! Engine that stores raw downloads on the local filesystem.
//!
//! Layout:
//! ```text
//! <path>/<sub_dir>/
//!   <filename>        # completed download
//!   <filename>.part   # download in progress
//! ```
//!
//! Only `.part` files this engine created are ever removed. Anything else
//! under the output directory belongs to the user.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::transport::Transport;

const PARTIAL_SUFFIX: &str = ".part";

/// Download-only engine writing raw files below an output directory.
pub struct FileEngine {
    output_dir: PathBuf,
    use_cache: bool,
    transport: Arc<dyn Transport>,
    downloaded: Vec<PathBuf>,
    /// Partial files written by `fetch` and not yet renamed into place.
    partials: Vec<PathBuf>,
}

impl FileEngine {
    /// Create an engine writing into `output_dir` through `transport`.
    pub fn new(output_dir: PathBuf, transport: Arc<dyn Transport>) -> Self {
        FileEngine {
            output_dir,
            use_cache: true,
            transport,
            downloaded: Vec::new(),
            partials: Vec::new(),
        }
    }

    fn target_path(&self, filename: &str) -> Result<PathBuf> {
        let relative = Path::new(filename);
        let well_formed = !filename.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(EngineError::InvalidFileName {
                name: filename.to_string(),
            });
        }
        Ok(self.output_dir.join(relative))
    }
}

impl Engine for FileEngine {
    fn name(&self) -> &str {
        "download only"
    }

    fn use_cache(&self) -> bool {
        self.use_cache
    }

    fn set_use_cache(&mut self, use_cache: bool) {
        self.use_cache = use_cache;
    }

    fn fetch(&mut self, url: &str, filename: &str) -> Result<PathBuf> {
        let target = self.target_path(filename)?;

        if self.use_cache && target.is_file() {
            debug!(path = %target.display(), "reusing cached file");
            self.downloaded.push(target.clone());
            return Ok(target);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let response = self.transport.get(url)?;
        if !response.is_success() {
            return Err(EngineError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let partial = partial_path(&target);
        self.partials.push(partial.clone());
        let stored = write_file(&partial, &response.body).and_then(|()| {
            fs::rename(&partial, &target).map_err(|source| EngineError::Io {
                path: target.clone(),
                source,
            })
        });
        if let Err(e) = stored {
            if remove_if_present(&partial).is_ok() {
                self.partials.retain(|p| p != &partial);
            }
            return Err(e);
        }
        self.partials.retain(|p| p != &partial);

        debug!(url, path = %target.display(), bytes = response.body.len(), "stored");
        self.downloaded.push(target.clone());
        Ok(target)
    }

    fn final_cleanup(&mut self) -> Result<()> {
        let mut removed = 0;
        while let Some(partial) = self.partials.pop() {
            if partial.exists() {
                remove_if_present(&partial)?;
                removed += 1;
            }
        }
        info!(
            files = self.downloaded.len(),
            removed_partials = removed,
            dir = %self.output_dir.display(),
            "engine cleanup"
        );
        Ok(())
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn downloaded(&self) -> &[PathBuf] {
        &self.downloaded
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let io_err = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(data).map_err(io_err)?;
    file.flush().map_err(io_err)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EngineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::TransportError;
    use crate::transport::Response;

    #[derive(Default)]
    struct MapTransport {
        responses: HashMap<String, Response>,
        requests: Mutex<Vec<String>>,
    }

    impl MapTransport {
        fn with(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), Response::new(status, body));
            self
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for MapTransport {
        fn get(&self, url: &str) -> std::result::Result<Response, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            Ok(self
                .responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| Response::new(404, "Not Found")))
        }
    }

    #[test]
    fn fetch_stores_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(MapTransport::default().with("http://data/iris.csv", 200, "a,b\n1,2\n"));
        let mut engine = FileEngine::new(dir.path().join("out"), transport);

        let path = engine.fetch("http://data/iris.csv", "iris.csv").unwrap();
        assert_eq!(path, dir.path().join("out/iris.csv"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        assert_eq!(engine.downloaded(), &[path]);
    }

    #[test]
    fn fetch_reuses_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("iris.csv"), "cached").unwrap();
        let transport =
            Arc::new(MapTransport::default().with("http://data/iris.csv", 200, "fresh"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport.clone());

        let path = engine.fetch("http://data/iris.csv", "iris.csv").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "cached");
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn fetch_without_cache_redownloads() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("iris.csv"), "cached").unwrap();
        let transport =
            Arc::new(MapTransport::default().with("http://data/iris.csv", 200, "fresh"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport.clone());
        engine.set_use_cache(false);

        let path = engine.fetch("http://data/iris.csv", "iris.csv").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "fresh");
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn fetch_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MapTransport::default().with("http://data/x", 503, "busy"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport);

        let err = engine.fetch("http://data/x", "x.csv").unwrap_err();
        assert!(matches!(err, EngineError::Status { status: 503, .. }));
        assert!(!dir.path().join("x.csv").exists());
        assert!(engine.downloaded().is_empty());
    }

    #[test]
    fn rejects_escaping_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = FileEngine::new(
            dir.path().to_path_buf(),
            Arc::new(MapTransport::default()),
        );

        for name in ["", "../evil.csv", "/etc/passwd"] {
            let err = engine.fetch("http://data/x", name).unwrap_err();
            assert!(matches!(err, EngineError::InvalidFileName { .. }), "{name}");
        }
    }

    #[test]
    fn nested_file_names_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MapTransport::default().with("http://data/t", 200, "t"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport);

        let path = engine.fetch("http://data/t", "tables/t.csv").unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn final_cleanup_leaves_foreign_partials() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("thesis")).unwrap();
        fs::write(dir.path().join("thesis/chapter1.part"), "draft").unwrap();
        fs::write(dir.path().join("notes.csv.part"), "mine").unwrap();
        let transport = Arc::new(MapTransport::default().with("http://data/a", 200, "a"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport);

        engine.fetch("http://data/a", "a.csv").unwrap();
        engine.final_cleanup().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("thesis/chapter1.part")).unwrap(),
            "draft"
        );
        assert!(dir.path().join("notes.csv.part").exists());
        assert!(dir.path().join("a.csv").is_file());
        assert!(!dir.path().join("a.csv.part").exists());
    }

    #[test]
    fn final_cleanup_removes_own_partials() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MapTransport::default().with("http://data/a", 200, "a"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport);
        let stale = dir.path().join("a.csv.part");
        engine.partials.push(stale.clone());
        fs::write(&stale, "half").unwrap();

        engine.final_cleanup().unwrap();
        assert!(!stale.exists());
        assert!(engine.partials.is_empty());
    }

    #[test]
    fn failed_rename_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the rename fail.
        fs::create_dir_all(dir.path().join("a.csv/occupied")).unwrap();
        let transport = Arc::new(MapTransport::default().with("http://data/a", 200, "a"));
        let mut engine = FileEngine::new(dir.path().to_path_buf(), transport);
        engine.set_use_cache(false);

        let err = engine.fetch("http://data/a", "a.csv").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(!dir.path().join("a.csv.part").exists());
        assert!(engine.partials.is_empty());
        assert!(engine.downloaded().is_empty());
    }

    #[test]
    fn final_cleanup_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = FileEngine::new(
            dir.path().join("never-created"),
            Arc::new(MapTransport::default()),
        );
        assert!(engine.final_cleanup().is_ok());
    }
}
