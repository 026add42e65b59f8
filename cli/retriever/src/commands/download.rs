//! `retriever download`: run dataset scripts into a directory.

use anyhow::{Context, Result};
use retriever_registry::{DownloadRequest, DownloadRun, ScriptOutcome};

use crate::session::Session;

/// Download every dataset matching `request.dataset`.
///
/// Datasets that fail without aborting the run are listed at the end; the
/// command still succeeds if at least one dataset completed.
pub fn run(session: &Session, request: &DownloadRequest) -> Result<()> {
    let run = session
        .downloader()
        .run(request)
        .with_context(|| format!("downloading '{}'", request.dataset))?;

    if !request.quiet {
        print!("{}", summary(&run));
    }
    if run.succeeded().is_empty() {
        anyhow::bail!("no dataset downloaded successfully");
    }
    Ok(())
}

fn summary(run: &DownloadRun) -> String {
    let mut out = String::new();
    for report in run.failed() {
        if let ScriptOutcome::Failed(failure) = &report.outcome {
            out.push_str(&format!("{} failed: {failure}\n", report.name));
        }
    }
    let done = run.succeeded();
    if !done.is_empty() {
        out.push_str(&format!(
            "Done! {} dataset(s) in {}\n",
            done.len(),
            run.engine.output_dir().display()
        ));
    }
    out
}
