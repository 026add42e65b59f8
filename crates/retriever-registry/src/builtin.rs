//! Procedures shipped with the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use retriever_engine::Engine;
use tracing::debug;

use crate::descriptor::{BoxError, DownloadStep, ScriptFailure};
use crate::procedure::{ProcedureStub, ProcedureTable};

/// Register every built-in procedure in `table`.
pub fn register(table: &mut ProcedureTable) {
    table.register("url_list", url_list);
}

/// Downloads a fixed table of `filename = url` pairs from `params.files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlList {
    files: BTreeMap<String, String>,
}

fn url_list(stub: &ProcedureStub) -> Result<Arc<dyn DownloadStep>, BoxError> {
    let table = stub
        .params
        .get("files")
        .and_then(toml::Value::as_table)
        .ok_or("url_list needs a [params.files] table")?;

    let mut files = BTreeMap::new();
    for (filename, url) in table {
        let url = url
            .as_str()
            .ok_or_else(|| format!("url for '{filename}' must be a string"))?;
        files.insert(filename.clone(), url.to_string());
    }
    if files.is_empty() {
        return Err("url_list needs at least one file".into());
    }
    Ok(Arc::new(UrlList { files }))
}

impl DownloadStep for UrlList {
    fn download(&self, engine: &mut dyn Engine, _debug: bool) -> Result<(), ScriptFailure> {
        for (filename, url) in &self.files {
            let path = engine.fetch(url, filename)?;
            debug!(url, path = %path.display(), "url_list fetched");
        }
        Ok(())
    }
}
