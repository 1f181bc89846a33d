use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable identifier for a record.
///
/// Handles are 128-bit UUIDs. Fresh handles are UUID v7, so handles minted by
/// one process sort in creation order. The nil UUID is reserved as the null
/// handle and means "no target" wherever a handle is stored in a pointer slot.
///
/// Handles carry no semantic content: equality and ordering only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(uuid::Uuid);

impl Handle {
    /// Mint a fresh, globally unique handle (UUID v7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// The null handle.
    pub const fn null() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Create from raw bytes. Intended for tests and deterministic fixtures.
    pub fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Returns `true` for the null handle.
    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    /// `None` for the null handle, `Some(self)` otherwise.
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for Handle {
    /// The default handle is the null handle, not a fresh one.
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({})", self.short_id())
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

impl FromStr for Handle {
    type Err = TypeError;

    /// Parse a handle, accepting an optional pair of surrounding braces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(s.trim());
        uuid::Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|e| TypeError::InvalidHandle(format!("{s}: {e}")))
    }
}

impl From<uuid::Uuid> for Handle {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

/// Ordered old→new handle correspondence.
///
/// Returned by clone (source handle → freshly minted handle) and accepted by
/// merge (destination handle → source handle). A `BTreeMap` keeps iteration
/// deterministic.
pub type HandleMap = BTreeMap<Handle, Handle>;
