use std::sync::Arc;

use tracing::info;
use wsg_store::RecordStore;
use wsg_types::{Handle, HandleMap};

use crate::error::CloneResult;
use crate::plan::{closure, ClonePlan};

/// How [`clone_records_with`] treats the copied records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Also clone everything the seeds point to, recursively.
    pub transitive: bool,
    /// Rename copies whose names collide in the destination.
    pub rename_conflicts: bool,
}

/// Clone `handles` from `src` into `dest` under fresh handles.
///
/// With `transitive`, everything the seeds point to (recursively) is cloned
/// too. Seeds absent from `src` are ignored. Scalars are copied verbatim.
/// Returns the old-to-new map.
pub fn clone_records(
    src: &RecordStore,
    handles: impl IntoIterator<Item = Handle>,
    dest: &mut RecordStore,
    transitive: bool,
) -> CloneResult<HandleMap> {
    let options = CloneOptions {
        transitive,
        rename_conflicts: false,
    };
    clone_records_with(src, handles, dest, options)
}

/// [`clone_records`] with explicit options.
pub fn clone_records_with(
    src: &RecordStore,
    handles: impl IntoIterator<Item = Handle>,
    dest: &mut RecordStore,
    options: CloneOptions,
) -> CloneResult<HandleMap> {
    let selected = closure(src, handles, options.transitive);
    let mut plan = ClonePlan::new(src, &selected, dest, &HandleMap::new())?;
    let renamed = if options.rename_conflicts {
        plan.resolve_name_conflicts(dest)
    } else {
        0
    };
    let map = plan.apply(dest)?;
    info!(cloned = map.len(), renamed, transitive = options.transitive, "records cloned");
    Ok(map)
}

/// Clone records within a single store.
///
/// Pointers from a copy to records outside the copied set keep pointing at
/// the originals. Copies are renamed to the next free name in their series,
/// so `"Zone"` is copied as `"Zone 1"`.
pub fn duplicate(
    store: &mut RecordStore,
    handles: impl IntoIterator<Item = Handle>,
    transitive: bool,
) -> CloneResult<HandleMap> {
    let selected = closure(store, handles, transitive);
    let mut plan = ClonePlan::new(store, &selected, store, &HandleMap::new())?;
    let renamed = plan.resolve_name_conflicts(store);
    let map = plan.apply(store)?;
    info!(duplicated = map.len(), renamed, transitive, "records duplicated");
    Ok(map)
}

/// Copy an entire store.
///
/// With `keep_handles` the copy reuses every handle and the returned map is
/// the identity; otherwise every record gets a fresh handle. The new store
/// shares the source's schema and configuration and starts with an empty
/// event journal.
pub fn clone_store(src: &RecordStore, keep_handles: bool) -> CloneResult<(RecordStore, HandleMap)> {
    if keep_handles {
        let store = RecordStore::from_snapshot(Arc::clone(src.schema()), src.config().clone(), src.snapshot())?;
        let map = src.handles().into_iter().map(|h| (h, h)).collect();
        return Ok((store, map));
    }

    let mut dest = RecordStore::with_config(Arc::clone(src.schema()), src.config().clone());
    let map = clone_records(src, src.handles(), &mut dest, false)?;
    dest.drain_events();
    Ok((dest, map))
}
