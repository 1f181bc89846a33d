//! Loading and saving snapshot files against a schema.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;
use wsg_schema::{SchemaFile, SchemaOracle};
use wsg_store::{RecordStore, StoreConfig, StoreSnapshot};

pub fn load_schema(path: &Path) -> anyhow::Result<Arc<dyn SchemaOracle>> {
    let schema = SchemaFile::load(path)
        .and_then(SchemaFile::into_schema)
        .with_context(|| format!("loading schema {}", path.display()))?;
    Ok(Arc::new(schema))
}

pub fn load_store(schema: &Arc<dyn SchemaOracle>, path: &Path) -> anyhow::Result<RecordStore> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: StoreSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let store = RecordStore::from_snapshot(Arc::clone(schema), StoreConfig::quiet(), snapshot)
        .with_context(|| format!("loading {}", path.display()))?;
    debug!(path = %path.display(), records = store.len(), "snapshot loaded");
    Ok(store)
}

pub fn save_store(store: &RecordStore, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&store.snapshot())?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), records = store.len(), "snapshot written");
    Ok(())
}
