//! Serializable store snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wsg_schema::SchemaOracle;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::PointerIndex;
use crate::record::Record;
use crate::store::RecordStore;

/// Every record of a store, in insertion order.
///
/// The reverse index is not serialized; it is rebuilt on load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<Record>,
}

impl StoreSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore {
    /// Copy every record out of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.values().cloned().collect(),
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// Null and duplicate handles are rejected, as is any pointer whose target
    /// is not in the snapshot. Records of types the schema does not know are
    /// loaded as-is and left for validation to report.
    pub fn from_snapshot(
        schema: Arc<dyn SchemaOracle>,
        config: StoreConfig,
        snapshot: StoreSnapshot,
    ) -> StoreResult<Self> {
        let mut seen = HashSet::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            if record.handle().is_null() {
                return Err(StoreError::NullHandle);
            }
            if !seen.insert(record.handle()) {
                return Err(StoreError::DuplicateHandle(record.handle()));
            }
        }
        for record in &snapshot.records {
            if let Some(fp) = record.forward_pointers().find(|fp| !seen.contains(&fp.target)) {
                return Err(StoreError::DanglingTarget {
                    handle: fp.source,
                    index: fp.field_index,
                    target: fp.target,
                });
            }
            if !schema.is_known(record.record_type()) {
                warn!(handle = %record.handle(), record_type = %record.record_type(), "snapshot record has unknown type");
            }
        }

        let records: IndexMap<_, _> = snapshot
            .records
            .into_iter()
            .map(|r| (r.handle(), r))
            .collect();
        let index = PointerIndex::rebuild(records.values());
        info!(records = records.len(), pointers = index.total(), "store loaded from snapshot");

        let mut store = Self::with_config(schema, config);
        store.records = records;
        store.index = index;
        Ok(store)
    }
}
