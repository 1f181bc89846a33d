//! The record store: storage, reads, and graph queries.
//!
//! Mutation lives in [`crate::mutation`], removal in [`crate::removal`]. Both
//! are `impl RecordStore` blocks; this module owns the struct and everything
//! that only reads.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use wsg_schema::SchemaOracle;
use wsg_types::{Handle, RecordType};

use crate::config::StoreConfig;
use crate::events::{EventBus, EventFilter, EventStream, StoreEvent};
use crate::index::PointerIndex;
use crate::naming;
use crate::record::{FieldSlot, ForwardPointer, Record, ReversePointer};

/// An in-memory object graph of typed records.
///
/// Records are kept in insertion order and keyed by [`Handle`]. Every pointer
/// field holds either the null handle or the handle of a record in this
/// store, and every such pointer has exactly one matching entry in the
/// reverse index. Both hold after every public call returns.
///
/// The store is single-writer: all mutators take `&mut self`.
pub struct RecordStore {
    pub(crate) schema: Arc<dyn SchemaOracle>,
    pub(crate) records: IndexMap<Handle, Record>,
    pub(crate) index: PointerIndex,
    pub(crate) events: EventBus,
    pub(crate) config: StoreConfig,
}

impl RecordStore {
    /// Create an empty store backed by the given schema.
    pub fn new(schema: Arc<dyn SchemaOracle>) -> Self {
        Self::with_config(schema, StoreConfig::default())
    }

    /// Create an empty store with explicit configuration.
    pub fn with_config(schema: Arc<dyn SchemaOracle>, config: StoreConfig) -> Self {
        Self {
            schema,
            records: IndexMap::new(),
            index: PointerIndex::new(),
            events: EventBus::new(&config),
            config,
        }
    }

    pub fn schema(&self) -> &Arc<dyn SchemaOracle> {
        &self.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ---------------------------------------------------------------
    // Record access
    // ---------------------------------------------------------------

    /// Returns `true` if a record with this handle is in the store.
    pub fn contains(&self, handle: &Handle) -> bool {
        self.records.contains_key(handle)
    }

    pub fn get(&self, handle: &Handle) -> Option<&Record> {
        self.records.get(handle)
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// All handles in insertion order.
    pub fn handles(&self) -> Vec<Handle> {
        self.records.keys().copied().collect()
    }

    /// Number of field slots the record currently has (0 if absent).
    pub fn field_count(&self, handle: &Handle) -> usize {
        self.records.get(handle).map_or(0, Record::field_count)
    }

    /// Text of a scalar field.
    ///
    /// With `allow_default`, an empty (or not yet grown) slot in the fixed
    /// region yields the schema default when there is one. Extensible slots
    /// never take defaults. Pointer slots and absent records yield `None`.
    pub fn get_scalar(&self, handle: &Handle, index: usize, allow_default: bool) -> Option<String> {
        let record = self.records.get(handle)?;
        let schema_default = || {
            let layout = self.schema.layout(record.record_type())?;
            if layout.is_extensible_index(index) {
                return None;
            }
            self.schema.default_text(record.record_type(), index)
        };
        match record.field(index) {
            Some(FieldSlot::Scalar(text)) if text.is_empty() && allow_default => {
                Some(schema_default().unwrap_or_default())
            }
            Some(FieldSlot::Scalar(text)) => Some(text.clone()),
            Some(FieldSlot::Pointer(_)) => None,
            None if allow_default => schema_default(),
            None => None,
        }
    }

    /// Target of a pointer field, or `None` if null, scalar, or absent.
    pub fn get_pointer(&self, handle: &Handle, index: usize) -> Option<Handle> {
        self.records.get(handle)?.field(index)?.as_pointer()
    }

    // ---------------------------------------------------------------
    // Pointer queries
    // ---------------------------------------------------------------

    /// Outgoing non-null pointers of a record, in field order.
    pub fn forward_pointers(&self, handle: &Handle) -> Vec<ForwardPointer> {
        self.records
            .get(handle)
            .map(|r| r.forward_pointers().collect())
            .unwrap_or_default()
    }

    /// Incoming pointers of a record, sorted by (source, field index).
    pub fn reverse_pointers(&self, handle: &Handle) -> Vec<ReversePointer> {
        self.index
            .reverse(handle)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct records pointing at `handle`, sorted.
    pub fn sources(&self, handle: &Handle) -> Vec<Handle> {
        let distinct: BTreeSet<Handle> = self
            .index
            .reverse(handle)
            .into_iter()
            .flatten()
            .map(|rp| rp.source)
            .collect();
        distinct.into_iter().collect()
    }

    /// Distinct records of `record_type` pointing at `handle`, sorted.
    pub fn sources_of_type(&self, handle: &Handle, record_type: &RecordType) -> Vec<Handle> {
        self.sources(handle)
            .into_iter()
            .filter(|s| {
                self.records
                    .get(s)
                    .is_some_and(|r| r.record_type() == record_type)
            })
            .collect()
    }

    /// Distinct records `handle` points at, in order of first occurrence.
    pub fn targets(&self, handle: &Handle) -> Vec<Handle> {
        let mut seen = BTreeSet::new();
        self.forward_pointers(handle)
            .into_iter()
            .map(|fp| fp.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Field indices of `source` that point at `target`.
    pub fn source_indices(&self, source: &Handle, target: &Handle) -> Vec<usize> {
        self.forward_pointers(source)
            .into_iter()
            .filter(|fp| fp.target == *target)
            .map(|fp| fp.field_index)
            .collect()
    }

    // ---------------------------------------------------------------
    // Type and name queries
    // ---------------------------------------------------------------

    pub fn records_of_type<'a>(&'a self, record_type: &'a RecordType) -> impl Iterator<Item = &'a Record> {
        self.records
            .values()
            .filter(move |r| r.record_type() == record_type)
    }

    pub fn num_records_of_type(&self, record_type: &RecordType) -> usize {
        self.records_of_type(record_type).count()
    }

    /// Returns `true` if the record's type belongs to naming scope `scope`.
    pub fn is_member(&self, handle: &Handle, scope: &str) -> bool {
        self.records
            .get(handle)
            .is_some_and(|r| self.schema.naming_scopes(r.record_type()).contains(scope))
    }

    /// The record's identifying name, if its type has a non-empty name field.
    pub fn name(&self, handle: &Handle) -> Option<String> {
        let record = self.records.get(handle)?;
        let index = self.schema.layout(record.record_type())?.name_field?;
        record
            .field(index)?
            .as_scalar()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Records whose name matches `name`, case-insensitively.
    ///
    /// With `exact == false`, names that differ only by a numeric suffix
    /// (`"Zone 2"` for `"Zone"`) also match.
    pub fn records_by_name(&self, name: &str, exact: bool) -> Vec<&Record> {
        self.records
            .values()
            .filter(|r| {
                self.name(&r.handle()).is_some_and(|candidate| {
                    if exact {
                        candidate.eq_ignore_ascii_case(name)
                    } else {
                        naming::base_names_match(name, &candidate)
                    }
                })
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Change notification
    // ---------------------------------------------------------------

    /// Run several mutations as one unit of notification: events are
    /// delivered once, after the outermost batch returns.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.events.begin();
        let result = f(self);
        self.events.end();
        result
    }

    /// Take all committed events not yet drained.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain()
    }

    /// Subscribe to committed events matching `filter`.
    pub fn subscribe(&mut self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    // ---------------------------------------------------------------
    // Integrity
    // ---------------------------------------------------------------

    /// Check pointer symmetry and the absence of dangling pointers against
    /// the records themselves. Returns a description of every violation;
    /// an empty vec means the store is consistent.
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut expected = 0usize;

        for record in self.records.values() {
            for fp in record.forward_pointers() {
                expected += 1;
                if !self.records.contains_key(&fp.target) {
                    violations.push(format!(
                        "{} field {} points at missing {}",
                        fp.source, fp.field_index, fp.target
                    ));
                }
                let entry = ReversePointer {
                    source: fp.source,
                    field_index: fp.field_index,
                };
                let indexed = self
                    .index
                    .reverse(&fp.target)
                    .is_some_and(|set| set.contains(&entry));
                if !indexed {
                    violations.push(format!(
                        "{} field {} -> {} has no reverse entry",
                        fp.source, fp.field_index, fp.target
                    ));
                }
            }
        }

        for (target, entries) in self.index.iter() {
            for rp in entries {
                let forward = self
                    .records
                    .get(&rp.source)
                    .and_then(|r| r.field(rp.field_index))
                    .and_then(FieldSlot::as_pointer);
                if forward != Some(*target) {
                    violations.push(format!(
                        "reverse entry {} <- {} field {} has no forward pointer",
                        target, rp.source, rp.field_index
                    ));
                }
            }
        }

        if self.index.total() != expected && violations.is_empty() {
            violations.push(format!(
                "reverse index holds {} entries, records hold {expected} pointers",
                self.index.total()
            ));
        }
        violations
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("record_count", &self.records.len())
            .field("reverse_entries", &self.index.total())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}
