use serde::{Deserialize, Serialize};

/// How much checking [`crate::validate`] does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictnessLevel {
    /// No checks at all.
    None,
    /// Field-level checks, plus name conflicts when enabled.
    #[default]
    Draft,
    /// Draft checks plus store-wide rules: required record types must be
    /// present and unique record types may appear at most once.
    Final,
}

/// Options for a validity pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityOptions {
    /// Report records whose names collide within a shared naming scope.
    pub check_names: bool,
    pub strictness: StrictnessLevel,
}

impl ValidityOptions {
    /// Draft strictness with or without name checks.
    pub fn new(check_names: bool) -> Self {
        Self {
            check_names,
            strictness: StrictnessLevel::Draft,
        }
    }

    pub fn with_strictness(mut self, strictness: StrictnessLevel) -> Self {
        self.strictness = strictness;
        self
    }
}
