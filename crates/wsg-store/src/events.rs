//! Change notification.
//!
//! Mutators stage events while they work; nothing is delivered until the
//! outermost public call (or [`crate::RecordStore::batch`]) returns. At that
//! point staged events are coalesced, appended to a bounded polling journal,
//! and fanned out to broadcast subscribers.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wsg_types::Handle;

use crate::config::StoreConfig;

/// A committed change to one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreEvent {
    Added(Handle),
    Changed { handle: Handle, field_index: usize },
    Removed(Handle),
}

impl StoreEvent {
    pub fn handle(&self) -> Handle {
        match self {
            Self::Added(h) | Self::Removed(h) => *h,
            Self::Changed { handle, .. } => *handle,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Changed { .. } => EventKind::Changed,
            Self::Removed(_) => EventKind::Removed,
        }
    }
}

/// Classification of store events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "Added",
            Self::Changed => "Changed",
            Self::Removed => "Removed",
        };
        write!(f, "{s}")
    }
}

/// Filter for subscribing to a subset of store events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events for these handles are delivered.
    pub handles: Option<BTreeSet<Handle>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// A filter that accepts everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events about the given handles.
    pub fn handles(handles: impl IntoIterator<Item = Handle>) -> Self {
        Self {
            handles: Some(handles.into_iter().collect()),
            kinds: None,
        }
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &StoreEvent) -> bool {
        if let Some(ref handles) = self.handles {
            if !handles.contains(&event.handle()) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for store events.
pub type EventStream = broadcast::Receiver<StoreEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<StoreEvent>,
}

/// Staging area, journal, and subscriber list for one store.
pub(crate) struct EventBus {
    enabled: bool,
    journal_capacity: usize,
    channel_capacity: usize,
    pending: Vec<StoreEvent>,
    journal: VecDeque<StoreEvent>,
    subscribers: Vec<Subscriber>,
    depth: usize,
}

impl EventBus {
    pub(crate) fn new(config: &StoreConfig) -> Self {
        Self {
            enabled: config.record_events,
            journal_capacity: config.journal_capacity,
            channel_capacity: config.channel_capacity.max(1),
            pending: Vec::new(),
            journal: VecDeque::new(),
            subscribers: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn stage(&mut self, event: StoreEvent) {
        if self.enabled {
            self.pending.push(event);
        }
    }

    pub(crate) fn begin(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.flush();
    }

    /// Deliver staged events unless a batch is still open.
    pub(crate) fn flush(&mut self) {
        if self.depth > 0 || self.pending.is_empty() {
            return;
        }
        let events = coalesce(std::mem::take(&mut self.pending));

        let mut dropped = 0usize;
        for event in &events {
            if self.journal_capacity > 0 {
                if self.journal.len() >= self.journal_capacity {
                    self.journal.pop_front();
                    dropped += 1;
                }
                self.journal.push_back(*event);
            }
            self.route(event);
        }
        if dropped > 0 {
            warn!(dropped, capacity = self.journal_capacity, "event journal full; oldest events dropped");
        }
        debug!(delivered = events.len(), subscribers = self.subscribers.len(), "store events committed");
    }

    pub(crate) fn drain(&mut self) -> Vec<StoreEvent> {
        self.journal.drain(..).collect()
    }

    pub(crate) fn subscribe(&mut self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.channel_capacity);
        self.subscribers.push(Subscriber { filter, sender: tx });
        rx
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Route an event to all matching subscribers, pruning closed channels.
    fn route(&mut self, event: &StoreEvent) {
        self.subscribers.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(*event).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }
}

/// Collapse the staged events of one public call.
///
/// - a record added and removed inside the same call produces nothing;
/// - `Changed` is dropped for records that were added or removed;
/// - duplicates keep their first position.
fn coalesce(events: Vec<StoreEvent>) -> Vec<StoreEvent> {
    let added: HashSet<Handle> = events
        .iter()
        .filter(|e| e.kind() == EventKind::Added)
        .map(StoreEvent::handle)
        .collect();
    let removed: HashSet<Handle> = events
        .iter()
        .filter(|e| e.kind() == EventKind::Removed)
        .map(StoreEvent::handle)
        .collect();

    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| {
            let h = event.handle();
            let transient = added.contains(&h) && removed.contains(&h);
            let keep = match event {
                _ if transient => false,
                StoreEvent::Changed { .. } => !added.contains(&h) && !removed.contains(&h),
                StoreEvent::Added(_) | StoreEvent::Removed(_) => true,
            };
            keep && seen.insert(*event)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u128) -> Handle {
        Handle::from_u128(n)
    }

    fn changed(n: u128, i: usize) -> StoreEvent {
        StoreEvent::Changed {
            handle: h(n),
            field_index: i,
        }
    }

    fn bus() -> EventBus {
        EventBus::new(&StoreConfig::default())
    }

    // -----------------------------------------------------------------------
    // Coalescing
    // -----------------------------------------------------------------------

    #[test]
    fn changes_to_added_records_are_folded() {
        let out = coalesce(vec![StoreEvent::Added(h(1)), changed(1, 0), changed(2, 0)]);
        assert_eq!(out, vec![StoreEvent::Added(h(1)), changed(2, 0)]);
    }

    #[test]
    fn changes_to_removed_records_are_folded() {
        let out = coalesce(vec![changed(1, 3), changed(2, 1), StoreEvent::Removed(h(1))]);
        assert_eq!(out, vec![changed(2, 1), StoreEvent::Removed(h(1))]);
    }

    #[test]
    fn transient_records_vanish() {
        let out = coalesce(vec![StoreEvent::Added(h(1)), changed(1, 0), StoreEvent::Removed(h(1))]);
        assert!(out.is_empty());
    }

    #[test]
    fn duplicates_keep_first_position() {
        let out = coalesce(vec![changed(1, 0), changed(2, 0), changed(1, 0)]);
        assert_eq!(out, vec![changed(1, 0), changed(2, 0)]);
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    #[test]
    fn nothing_delivered_inside_batch() {
        let mut bus = bus();
        bus.begin();
        bus.stage(StoreEvent::Added(h(1)));
        bus.flush();
        assert!(bus.drain().is_empty());
        bus.end();
        assert_eq!(bus.drain(), vec![StoreEvent::Added(h(1))]);
    }

    #[test]
    fn journal_is_bounded() {
        let config = StoreConfig {
            journal_capacity: 2,
            ..StoreConfig::default()
        };
        let mut bus = EventBus::new(&config);
        for n in 1..=3 {
            bus.stage(StoreEvent::Added(h(n)));
            bus.flush();
        }
        assert_eq!(bus.drain(), vec![StoreEvent::Added(h(2)), StoreEvent::Added(h(3))]);
    }

    #[test]
    fn disabled_bus_stages_nothing() {
        let config = StoreConfig {
            record_events: false,
            ..StoreConfig::default()
        };
        let mut bus = EventBus::new(&config);
        bus.stage(StoreEvent::Added(h(1)));
        bus.flush();
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn subscribers_receive_matching_events() {
        let mut bus = bus();
        let mut all = bus.subscribe(EventFilter::all());
        let mut only_two = bus.subscribe(EventFilter::handles([h(2)]));
        bus.stage(StoreEvent::Added(h(1)));
        bus.stage(StoreEvent::Added(h(2)));
        bus.flush();

        assert_eq!(all.try_recv().unwrap(), StoreEvent::Added(h(1)));
        assert_eq!(all.try_recv().unwrap(), StoreEvent::Added(h(2)));
        assert_eq!(only_two.try_recv().unwrap(), StoreEvent::Added(h(2)));
        assert!(only_two.try_recv().is_err());
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let mut bus = bus();
        let rx = bus.subscribe(EventFilter::all());
        drop(rx);
        bus.stage(StoreEvent::Added(h(1)));
        bus.flush();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn kind_filter() {
        let filter = EventFilter {
            handles: None,
            kinds: Some(vec![EventKind::Removed]),
        };
        assert!(filter.matches(&StoreEvent::Removed(h(1))));
        assert!(!filter.matches(&StoreEvent::Added(h(1))));
    }
}
