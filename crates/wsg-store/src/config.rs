use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::RecordStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// When `false`, no change events are staged or delivered.
    pub record_events: bool,
    /// Maximum events held for [`crate::RecordStore::drain_events`]. The
    /// oldest events are dropped when full; `0` disables the journal.
    pub journal_capacity: usize,
    /// Buffer size of each subscriber's broadcast channel.
    pub channel_capacity: usize,
    /// When `true`, [`crate::RecordStore::next_name`] returns a fresh handle
    /// string instead of scanning for the next numeric suffix.
    pub fast_naming: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_events: true,
            journal_capacity: 4096,
            channel_capacity: 1024,
            fast_naming: false,
        }
    }
}

impl StoreConfig {
    /// A configuration with change notification switched off, for scratch
    /// stores nobody observes.
    pub fn quiet() -> Self {
        Self {
            record_events: false,
            journal_capacity: 0,
            ..Default::default()
        }
    }
}
