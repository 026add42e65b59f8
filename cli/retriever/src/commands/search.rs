//! `retriever search`: query the upstream repository.

use anyhow::{Context, Result};
use retriever_registry::ScriptDescriptor;

use crate::session::Session;

/// Print upstream dataset names matching any keyword or license.
///
/// Names already available locally are marked.
pub fn run(session: &Session, keywords: &[String], licenses: &[String]) -> Result<()> {
    let names = session
        .upstream()
        .search(keywords, licenses)
        .context("searching upstream repository")?;

    if names.is_empty() {
        println!("No datasets found upstream.");
        return Ok(());
    }

    let local = session.registry.get().context("loading scripts")?;
    print!("{}", results(&names, &local));
    Ok(())
}

fn results(names: &[String], local: &[ScriptDescriptor]) -> String {
    let mut out = String::new();
    for name in names {
        out.push_str(name);
        if local.iter().any(|s| s.is_named(name)) {
            out.push_str(" (installed)");
        }
        out.push('\n');
    }
    out
}
