//! Replacing a record in place while keeping its referrers.

use tracing::debug;
use wsg_types::{Handle, RecordType};

use crate::error::{StoreError, StoreResult};
use crate::record::{FieldSlot, ReversePointer};
use crate::store::RecordStore;

impl RecordStore {
    /// Replace `current` with a new record built from `record_type` and
    /// `fields`, repointing every referrer of `current` at it.
    ///
    /// A replacement of another type must share a naming scope with
    /// `current`, and every field pointing at `current` must accept the new
    /// type. If the replacement's name collides with a record other than
    /// `current`, it takes the next free name in its series. Pointers from
    /// `current` itself are not carried over. Returns the new handle.
    pub fn swap(&mut self, current: &Handle, record_type: RecordType, mut fields: Vec<FieldSlot>) -> StoreResult<Handle> {
        let old = self.get(current).ok_or(StoreError::NotFound(*current))?;
        let old_type = old.record_type().clone();
        let layout = self
            .schema
            .layout(&record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.clone()))?;
        if !self.share_naming_scope(&old_type, &record_type) {
            return Err(StoreError::IncompatibleReplacement {
                handle: *current,
                record_type,
            });
        }

        let referrers: Vec<ReversePointer> = self
            .reverse_pointers(current)
            .into_iter()
            .filter(|rp| rp.source != *current)
            .collect();
        for rp in &referrers {
            let Some(source) = self.get(&rp.source) else {
                continue;
            };
            if !self
                .schema
                .can_target(source.record_type(), rp.field_index, &record_type)
            {
                return Err(StoreError::TypeMismatch {
                    handle: rp.source,
                    index: rp.field_index,
                    target: *current,
                    target_type: record_type,
                });
            }
        }

        if let Some(slot) = layout.name_field.and_then(|i| fields.get_mut(i)) {
            if let Some(name) = slot.as_scalar() {
                if self.name_conflict(name, &record_type, Some(current)) {
                    let renamed = self.next_name(name, false);
                    debug!(from = name, to = %renamed, "replacement renamed");
                    *slot = FieldSlot::Scalar(renamed);
                }
            }
        }

        self.batch(|store| -> StoreResult<Handle> {
            let replacement = store.create(record_type, fields)?;
            for rp in &referrers {
                store.set_pointer(&rp.source, rp.field_index, replacement)?;
            }
            store.remove(current);
            debug!(
                from = %current.short_id(),
                to = %replacement.short_id(),
                referrers = referrers.len(),
                "record swapped"
            );
            Ok(replacement)
        })
    }
}
