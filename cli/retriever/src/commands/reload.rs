//! `retriever reload`: rescan script directories.

use anyhow::{Context, Result};

use crate::session::Session;

/// Rescan every search path, report scripts that failed to load, and
/// replace the registry contents.
pub fn run(session: &Session) -> Result<()> {
    let report = session.loader.scan().context("scanning script directories")?;
    for failure in &report.failures {
        eprintln!("{failure}");
    }
    let scripts = session.registry.set(report.scripts);
    println!("Reloaded {} script(s).", scripts.len());
    Ok(())
}
