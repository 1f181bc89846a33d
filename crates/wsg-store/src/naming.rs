//! Record names: numeric suffixes and next-name generation.

use wsg_types::{Handle, RecordType};

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;

/// Split `"Zone 12"` into `("Zone", Some((" ", 12)))`.
///
/// A suffix is a run of trailing ASCII digits preceded by a space or an
/// underscore. Names without one return the whole name as the base.
pub(crate) fn split_suffix(name: &str) -> (&str, Option<(&str, u64)>) {
    let trimmed = name.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    let Some(start) = digits_start else {
        return (trimmed, None);
    };
    let spacer = match trimmed[..start].chars().last() {
        Some(c @ (' ' | '_')) => c,
        _ => return (trimmed, None),
    };
    let spacer_start = start - spacer.len_utf8();
    let spacer = &trimmed[spacer_start..start];
    match trimmed[start..].parse::<u64>() {
        Ok(n) => (trimmed[..spacer_start].trim_end(), Some((spacer, n))),
        Err(_) => (trimmed, None),
    }
}

/// Returns `true` if both names share a base name, ignoring case.
pub(crate) fn base_names_match(a: &str, b: &str) -> bool {
    split_suffix(a).0.eq_ignore_ascii_case(split_suffix(b).0)
}

/// The next name in the series of `name`, given the names already in use.
///
/// Only names sharing `name`'s base (ignoring case) count as taken. Returns
/// `None` when every suffix up to `u64::MAX` is in use.
pub fn next_name_among<'a>(name: &str, existing: impl IntoIterator<Item = &'a str>, fill_in: bool) -> Option<String> {
    let (base, own_suffix) = split_suffix(name);
    let mut spacer = own_suffix.map(|(s, _)| s.to_string());
    let mut taken: Vec<u64> = Vec::new();
    for existing in existing {
        if !base_names_match(name, existing) {
            continue;
        }
        if let (_, Some((s, n))) = split_suffix(existing) {
            taken.push(n);
            spacer.get_or_insert_with(|| s.to_string());
        }
    }
    taken.sort_unstable();
    taken.dedup();

    let after_highest = if fill_in {
        None
    } else {
        taken.last().map_or(Some(1), |n| n.checked_add(1))
    };
    let suffix = match after_highest {
        Some(n) => n,
        None => lowest_free(&taken)?,
    };
    Some(format!("{base}{}{suffix}", spacer.as_deref().unwrap_or(" ")))
}

/// The smallest positive suffix missing from sorted, deduplicated `taken`.
fn lowest_free(taken: &[u64]) -> Option<u64> {
    let mut candidate: u64 = 1;
    for n in taken {
        if *n == candidate {
            candidate = candidate.checked_add(1)?;
        } else if *n > candidate {
            break;
        }
    }
    Some(candidate)
}

impl RecordStore {
    /// A name in the series of `name` that no record uses yet.
    ///
    /// Existing names `"Zone 1"`, `"Zone 3"` give `"Zone 4"`, or `"Zone 2"`
    /// with `fill_in`. When the highest suffix is already `u64::MAX` the
    /// lowest free suffix is used instead. With fast naming configured, or
    /// when no suffix is free, returns a fresh handle string.
    pub fn next_name(&self, name: &str, fill_in: bool) -> String {
        if self.config.fast_naming {
            return Handle::new().to_string();
        }
        let existing: Vec<String> = self
            .records_by_name(name, false)
            .into_iter()
            .filter_map(|record| self.name(&record.handle()))
            .collect();
        next_name_among(name, existing.iter().map(String::as_str), fill_in)
            .unwrap_or_else(|| Handle::new().to_string())
    }

    /// Returns `true` if records of types `a` and `b` draw names from a
    /// common pool: the same type, or types sharing a naming scope.
    pub fn share_naming_scope(&self, a: &RecordType, b: &RecordType) -> bool {
        a == b || !self.schema.naming_scopes(a).is_disjoint(&self.schema.naming_scopes(b))
    }

    /// Returns `true` if a `record_type` record named `name` would collide
    /// with a record other than `except`.
    pub fn name_conflict(&self, name: &str, record_type: &RecordType, except: Option<&Handle>) -> bool {
        !name.is_empty()
            && self
                .records_by_name(name, true)
                .into_iter()
                .filter(|r| except != Some(&r.handle()))
                .any(|r| self.share_naming_scope(record_type, r.record_type()))
    }

    /// Set the record's identifying name.
    pub fn set_name(&mut self, handle: &Handle, name: &str) -> StoreResult<()> {
        let record = self.get(handle).ok_or(StoreError::NotFound(*handle))?;
        let index = self
            .schema
            .layout(record.record_type())
            .and_then(|l| l.name_field)
            .ok_or_else(|| StoreError::NoNameField(record.record_type().clone()))?;
        self.set_scalar(handle, index, name)
    }
}
