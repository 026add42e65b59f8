//! Script discovery across the configured search paths.
//!
//! Search paths are scanned in priority order. Within each path, JSON data
//! packages are read first, then `.proc` stubs, each group in file-name
//! order. The first script to claim a (case-insensitive) name keeps it, so a
//! user-local script shadows a bundled one and a data package shadows a
//! procedure of the same name in the same directory.
//!
//! A malformed data package is skipped quietly. A stub that fails to load is
//! recorded as a [`LoadFailure`] and logged; the scan always continues.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::descriptor::{Provenance, ScriptDescriptor};
use crate::error::{RegistryError, Result};
use crate::integrity::ContentHash;
use crate::package::DataPackage;
use crate::procedure::{self, ProcedureError, ProcedureStub, ProcedureTable, STUB_EXTENSION};
use crate::registry::ScriptSource;
use crate::version::{self, Version};

/// A script that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Script (file stem) that failed.
    pub script: String,
    /// Search path it was found in.
    pub search_path: PathBuf,
    /// Underlying error.
    pub error: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to load script: {} ({}): {}",
            self.script,
            self.search_path.display(),
            self.error
        )
    }
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Accepted scripts in discovery order.
    pub scripts: Vec<ScriptDescriptor>,
    /// Stubs that could not be loaded.
    pub failures: Vec<LoadFailure>,
}

/// Scans search paths for dataset scripts.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    search_paths: Vec<PathBuf>,
    write_path: PathBuf,
    system_version: Version,
    procedures: ProcedureTable,
}

impl ScriptLoader {
    /// Create a loader with the built-in procedures registered.
    pub fn new(search_paths: Vec<PathBuf>, write_path: PathBuf, system_version: Version) -> Self {
        ScriptLoader {
            search_paths,
            write_path,
            system_version,
            procedures: ProcedureTable::with_builtins(),
        }
    }

    /// Create a loader from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.search_paths.clone(),
            settings.write_path.clone(),
            settings.version()?,
        ))
    }

    /// Replace the procedure table.
    pub fn with_procedures(mut self, procedures: ProcedureTable) -> Self {
        self.procedures = procedures;
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn write_path(&self) -> &Path {
        &self.write_path
    }

    /// Scan every search path and return accepted scripts and failures.
    ///
    /// Only failing to create the script cache directory is an error.
    pub fn scan(&self) -> Result<LoadReport> {
        fs::create_dir_all(&self.write_path).map_err(|e| RegistryError::CacheError {
            path: self.write_path.clone(),
            detail: format!("creating script cache: {e}"),
        })?;

        let mut scan = Scan::default();
        for search_path in self.search_paths.iter().filter(|p| p.is_dir()) {
            let files = match sorted_files(search_path) {
                Ok(files) => files,
                Err(e) => {
                    warn!(path = %search_path.display(), "cannot list search path: {e}");
                    continue;
                }
            };

            for path in files.iter().filter(|p| has_extension(p, "json")) {
                self.load_package(path, &mut scan);
            }
            for path in files.iter().filter(|p| has_extension(p, STUB_EXTENSION)) {
                self.load_stub(search_path, path, &mut scan);
            }
        }

        debug!(
            scripts = scan.report.scripts.len(),
            failures = scan.report.failures.len(),
            "script scan finished"
        );
        Ok(scan.report)
    }

    /// Scan and return only the accepted scripts.
    pub fn load_all(&self) -> Result<Vec<ScriptDescriptor>> {
        Ok(self.scan()?.scripts)
    }

    fn load_package(&self, path: &Path, scan: &mut Scan) {
        let stem = file_stem(path);
        if scan.files.contains(&stem) {
            return;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), "skipping unreadable data package: {e}");
                return;
            }
        };
        let package = match DataPackage::from_slice(&data, path) {
            Ok(package) => package,
            Err(e) => {
                debug!("skipping data package: {e}");
                return;
            }
        };

        let descriptor = package.into_descriptor();
        scan.accept(descriptor, path, stem, &data, &self.system_version);
    }

    fn load_stub(&self, search_path: &Path, path: &Path, scan: &mut Scan) {
        let stem = file_stem(path);
        if stem.starts_with('_') || scan.files.contains(&stem) {
            return;
        }

        match procedure::has_marker(path) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                scan.fail(&stem, search_path, &ProcedureError::Io(e));
                return;
            }
        }
        scan.files.insert(stem.clone());

        let loaded = fs::read(path).map_err(ProcedureError::Io).and_then(|data| {
            let stub = ProcedureStub::parse(&String::from_utf8_lossy(&data))?;
            let descriptor = self.procedures.instantiate(&stem, &stub)?;
            Ok((descriptor, data))
        });

        match loaded {
            Ok((descriptor, data)) => {
                scan.accept(descriptor, path, stem, &data, &self.system_version)
            }
            Err(e) => scan.fail(&stem, search_path, &e),
        }
    }
}

impl ScriptSource for ScriptLoader {
    fn load_scripts(&self) -> Result<Vec<ScriptDescriptor>> {
        self.load_all()
    }
}

/// Bookkeeping for one scan.
#[derive(Default)]
struct Scan {
    report: LoadReport,
    names: HashSet<String>,
    files: HashSet<String>,
}

impl Scan {
    fn accept(
        &mut self,
        descriptor: ScriptDescriptor,
        path: &Path,
        stem: String,
        data: &[u8],
        current: &Version,
    ) {
        if self.names.contains(&descriptor.key()) {
            debug!(
                script = %descriptor.name,
                path = %path.display(),
                "shadowed by an earlier script of the same name"
            );
            return;
        }
        if !version::is_compatible(&descriptor, current) {
            return;
        }

        self.names.insert(descriptor.key());
        self.files.insert(stem.clone());
        let descriptor = descriptor.with_source(Provenance {
            location: path.display().to_string(),
            file_stem: stem,
            digest: ContentHash::compute(data),
        });
        self.report.scripts.push(descriptor);
    }

    fn fail(&mut self, script: &str, search_path: &Path, error: &ProcedureError) {
        let failure = LoadFailure {
            script: script.to_string(),
            search_path: search_path.to_path_buf(),
            error: error.to_string(),
        };
        warn!("{failure}");
        self.report.failures.push(failure);
    }
}

/// Regular files directly inside `dir`, sorted by file name.
fn sorted_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ScriptKind;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn package(name: &str, minimum: Option<&str>) -> String {
        match minimum {
            Some(min) => format!(
                r#"{{"name": "{name}", "retriever_minimum_version": "{min}", "urls": {{"t": "http://h/{name}.csv"}}}}"#
            ),
            None => format!(r#"{{"name": "{name}", "urls": {{"t": "http://h/{name}.csv"}}}}"#),
        }
    }

    fn stub(name: &str) -> String {
        format!(
            "#retriever\nname = \"{name}\"\nprocedure = \"url_list\"\n\n[params.files]\n\"{name}.zip\" = \"http://h/{name}.zip\"\n"
        )
    }

    fn loader(paths: &[PathBuf], write_path: &Path) -> ScriptLoader {
        ScriptLoader::new(
            paths.to_vec(),
            write_path.to_path_buf(),
            Version::parse("2.1.0").unwrap(),
        )
    }

    fn names(scripts: &[ScriptDescriptor]) -> Vec<&str> {
        scripts.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn creates_write_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("home/scripts");
        let scripts = loader(&[], &cache).load_all().unwrap();
        assert!(scripts.is_empty());
        assert!(cache.is_dir());
        // Idempotent.
        assert!(loader(&[], &cache).load_all().is_ok());
    }

    #[test]
    fn earlier_search_path_shadows_later() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user");
        let bundled = dir.path().join("bundled");
        write(&user, "iris.json", &package("iris", None));
        write(&bundled, "iris_copy.json", &package("IRIS", None));
        write(&bundled, "bird-size.json", &package("bird-size", None));

        let scripts = loader(&[user.clone(), bundled.clone()], &user).load_all().unwrap();
        assert_eq!(names(&scripts), vec!["iris", "bird-size"]);
        let iris = scripts[0].source().unwrap();
        assert!(iris.location.starts_with(&user.display().to_string()));
        assert_eq!(iris.file_stem, "iris");
    }

    #[test]
    fn declarative_shadows_procedure_in_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        write(&path, "mammals.json", &package("mammals", None));
        write(&path, "mammals.proc", &stub("mammals"));
        write(&path, "other_mammals.proc", &stub("Mammals"));

        let scripts = loader(&[path.clone()], &path).load_all().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].kind, ScriptKind::Declarative);
    }

    #[test]
    fn version_gate_excludes_newer_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        write(&path, "a_equal.json", &package("equal", Some("2.1.0")));
        write(&path, "b_newer.json", &package("newer", Some("2.2")));
        write(&path, "c_older.json", &package("older", Some("1.9")));
        write(&path, "d_none.json", &package("none", None));

        let scripts = loader(&[path.clone()], &path).load_all().unwrap();
        assert_eq!(names(&scripts), vec!["equal", "older", "none"]);
    }

    #[test]
    fn excluded_newer_script_does_not_shadow_later_path() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user");
        let bundled = dir.path().join("bundled");
        write(&user, "iris.json", &package("iris", Some("9.0")));
        write(&bundled, "iris.json", &package("iris", None));

        let scripts = loader(&[user.clone(), bundled.clone()], &user).load_all().unwrap();
        assert_eq!(names(&scripts), vec!["iris"]);
        assert!(scripts[0]
            .source()
            .unwrap()
            .location
            .starts_with(&bundled.display().to_string()));
    }

    #[test]
    fn malformed_package_is_skipped_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        write(&path, "broken.json", "{ this is not json");
        write(&path, "good.json", &package("good", None));

        let report = loader(&[path.clone()], &path).scan().unwrap();
        assert_eq!(names(&report.scripts), vec!["good"]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn failing_stub_is_reported_and_scan_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        write(&path, "a_unknown.proc", "#retriever\nprocedure = \"no_such_thing\"\n");
        write(&path, "b_badtoml.proc", "#retriever\nname = \n");
        write(&path, "c_good.proc", &stub("good"));

        let report = loader(&[path.clone()], &path).scan().unwrap();
        assert_eq!(names(&report.scripts), vec!["good"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].script, "a_unknown");
        assert_eq!(report.failures[0].search_path, path);
        assert!(report.failures[0].error.contains("no_such_thing"));
        assert!(report.failures[1].to_string().contains("b_badtoml"));
    }

    #[test]
    fn unmarked_and_private_stubs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        write(&path, "notes.proc", "just some notes\nnot a script\n");
        write(&path, "_helper.proc", &stub("helper"));
        write(&path, "readme.txt", "#retriever\n");

        let report = loader(&[path.clone()], &path).scan().unwrap();
        assert!(report.scripts.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn missing_search_paths_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        write(&present, "iris.json", &package("iris", None));

        let scripts = loader(&[dir.path().join("absent"), present.clone()], &present)
            .load_all()
            .unwrap();
        assert_eq!(names(&scripts), vec!["iris"]);
    }

    #[test]
    fn output_order_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        for name in ["zeta", "alpha", "mid"] {
            write(&path, &format!("{name}.json"), &package(name, None));
        }
        write(&path, "beta.proc", &stub("beta"));

        let first = loader(&[path.clone()], &path).load_all().unwrap();
        let second = loader(&[path.clone()], &path).load_all().unwrap();
        assert_eq!(names(&first), vec!["alpha", "mid", "zeta", "beta"]);
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn provenance_records_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts");
        let content = package("iris", None);
        write(&path, "iris.json", &content);

        let scripts = loader(&[path.clone()], &path).load_all().unwrap();
        let source = scripts[0].source().unwrap();
        assert_eq!(source.digest, ContentHash::compute(content.as_bytes()));
    }
}
