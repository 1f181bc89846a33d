use std::fmt;

use serde::{Deserialize, Serialize};
use wsg_types::{Handle, HandleMap};

/// What a merge did to the destination store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Destination handles of records cloned in from the source.
    pub added: Vec<Handle>,
    /// Matched records whose fields changed.
    pub updated: Vec<Handle>,
    /// Unmatched records removed from the destination.
    pub removed: Vec<Handle>,
    /// Number of matched pairs.
    pub matched: usize,
    /// Source handle to destination handle for every added record.
    pub new_handles: HandleMap,
}

impl MergeReport {
    /// Returns `true` if the merge left the destination unchanged.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.added.len()
    }

    pub fn updates(&self) -> usize {
        self.updated.len()
    }

    pub fn removals(&self) -> usize {
        self.removed.len()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched, {} added, {} updated, {} removed",
            self.matched,
            self.additions(),
            self.updates(),
            self.removals()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_noop() {
        let report = MergeReport {
            matched: 4,
            ..MergeReport::default()
        };
        assert!(report.is_noop());
        assert_eq!(report.to_string(), "4 matched, 0 added, 0 updated, 0 removed");
    }

    #[test]
    fn report_serializes() {
        let report = MergeReport {
            removed: vec![Handle::from_u128(1)],
            ..MergeReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["removed"][0], "00000000-0000-0000-0000-000000000001");
        assert!(!report.is_noop());
    }
}
