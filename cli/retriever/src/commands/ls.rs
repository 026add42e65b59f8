//! `retriever ls`: list locally available datasets.

use anyhow::{Context, Result};
use retriever_registry::{filter_datasets, ScriptDescriptor};

use crate::session::Session;

/// Print the datasets available locally, optionally filtered.
pub fn run(session: &Session, keywords: &[String], licenses: &[String], long: bool) -> Result<()> {
    let scripts = session.registry.get().context("loading scripts")?;
    print!("{}", listing(&scripts, keywords, licenses, long));
    Ok(())
}

fn listing(
    scripts: &[ScriptDescriptor],
    keywords: &[String],
    licenses: &[String],
    long: bool,
) -> String {
    let mut selected = filter_datasets(scripts, keywords, licenses);
    selected.sort_by_key(ScriptDescriptor::key);

    if selected.is_empty() {
        return if keywords.is_empty() && licenses.is_empty() {
            "No datasets available. Try `retriever search` and `retriever fetch <name>`.\n"
                .to_string()
        } else {
            "No datasets match the given keywords or licenses.\n".to_string()
        };
    }

    let mut out = format!("Available datasets : {}\n\n", selected.len());
    for script in &selected {
        if long {
            out.push_str(&describe(script));
        } else {
            out.push_str(&script.name);
            out.push('\n');
        }
    }
    out
}

fn describe(script: &ScriptDescriptor) -> String {
    let mut out = format!("{}\n", script.name);
    if let Some(title) = &script.title {
        out.push_str(&format!("  title:    {title}\n"));
    }
    if !script.keywords.is_empty() {
        out.push_str(&format!("  keywords: {}\n", script.keywords.join(", ")));
    }
    if !script.licenses.is_empty() {
        out.push_str(&format!("  licenses: {}\n", script.licenses.join(", ")));
    }
    if let Some(version) = &script.version {
        out.push_str(&format!("  version:  {version}\n"));
    }
    if let Some(source) = script.source() {
        out.push_str(&format!(
            "  source:   {} ({})\n",
            source.location,
            source.digest.short()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::*;

    #[test]
    fn lists_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            &bundled(dir.path()),
            "iris.json",
            r#"{"name": "iris", "title": "Iris flowers", "keywords": ["plants"],
                "licenses": [{"name": "CC0-1.0"}], "version": "1.0.3"}"#,
        );
        write_script(
            &bundled(dir.path()),
            "bird_size.json",
            r#"{"name": "Bird-Size", "keywords": ["birds"], "licenses": ["MIT"]}"#,
        );
        let session = session(dir.path(), CannedTransport::default());
        let scripts = session.registry.get().unwrap();

        assert_eq!(
            listing(&scripts, &[], &[], false),
            "Available datasets : 2\n\nBird-Size\niris\n"
        );
        assert_eq!(
            listing(&scripts, &["PLANTS".to_string()], &[], false),
            "Available datasets : 1\n\niris\n"
        );
        assert_eq!(
            listing(&scripts, &[], &["mit".to_string()], false),
            "Available datasets : 1\n\nBird-Size\n"
        );
        assert_eq!(
            listing(&scripts, &["fungi".to_string()], &[], false),
            "No datasets match the given keywords or licenses.\n"
        );

        let long = listing(&scripts, &["plants".to_string()], &[], true);
        assert!(long.starts_with(
            "Available datasets : 1\n\niris\n  title:    Iris flowers\n  keywords: plants\n  licenses: CC0-1.0\n  version:  1.0.3\n"
        ));
        assert!(long.contains("  source:   "));
        assert!(long.contains("iris.json ("));
        assert!(!long.contains("Bird-Size"));

        run(&session, &[], &[], false).unwrap();
    }

    #[test]
    fn empty_registry_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), CannedTransport::default());
        let scripts = session.registry.get().unwrap();
        assert!(listing(&scripts, &[], &[], false).starts_with("No datasets available."));
        run(&session, &[], &[], false).unwrap();
    }
}
