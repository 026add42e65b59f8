//! `retriever fetch`: bring one script into the local script cache.

use anyhow::{Context, Result};
use retriever_registry::get_script;

use crate::session::Session;

/// Look `name` up locally, else fetch it from upstream and reload.
pub fn run(session: &Session, name: &str) -> Result<()> {
    let already_local = session
        .registry
        .find(name)
        .context("loading scripts")?
        .is_some();
    let upstream = session.upstream();
    let script = get_script(&session.registry, Some(&upstream), name)?;

    if already_local {
        println!("{} is already available.", script.name);
        return Ok(());
    }

    session.registry.reload().context("reloading scripts")?;
    match script.source() {
        Some(source) => println!("Fetched {} into {}", script.name, source.location),
        None => println!("Fetched {}", script.name),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::*;

    #[test]
    fn fetch_caches_and_registers() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(
            dir.path(),
            CannedTransport::default().with(
                "https://repo.test/scripts/bird_size.json",
                200,
                r#"{"name": "bird-size"}"#,
            ),
        );

        run(&session, "bird-size").unwrap();
        assert!(dir.path().join("scripts/bird_size.json").is_file());
        assert!(session.registry.find("bird-size").unwrap().is_some());

        // Second time it is already local.
        run(&session, "BIRD-SIZE").unwrap();
    }

    #[test]
    fn fetch_unknown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), CannedTransport::default());
        let err = run(&session, "nope").unwrap_err();
        assert!(format!("{err:#}").contains("no dataset matched 'nope'"));
    }
}
