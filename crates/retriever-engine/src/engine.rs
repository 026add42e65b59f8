//! The engine contract seen by dataset scripts and the download workflow.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// A storage/transformation backend that dataset scripts download into.
///
/// Engines are driven strictly sequentially: one script at a time, each
/// followed by [`Engine::final_cleanup`] when its download step succeeds.
pub trait Engine: Send {
    /// Short engine name used in progress output.
    fn name(&self) -> &str;

    /// Whether previously downloaded raw files may be reused.
    fn use_cache(&self) -> bool;

    /// Allow or forbid reuse of previously downloaded raw files.
    fn set_use_cache(&mut self, use_cache: bool);

    /// Retrieve `url` and store it as `filename` inside the output directory.
    ///
    /// Returns the path of the stored file.
    fn fetch(&mut self, url: &str, filename: &str) -> Result<PathBuf>;

    /// Release per-script resources once a script's download step finished.
    fn final_cleanup(&mut self) -> Result<()>;

    /// Directory that receives the engine's output.
    fn output_dir(&self) -> &Path;

    /// Files produced so far, in download order.
    fn downloaded(&self) -> &[PathBuf];
}
