//! Table-driven [`SchemaOracle`] implementation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wsg_types::RecordType;

use crate::error::{SchemaError, SchemaResult};
use crate::oracle::{FieldKind, RecordLayout, SchemaOracle, ScopeId};

/// Description of one field of a record type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Naming scopes a pointer field accepts. Ignored for scalar fields.
    #[serde(default)]
    pub object_lists: Vec<ScopeId>,
}

impl FieldSpec {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            required: false,
            default: None,
            object_lists: Vec::new(),
        }
    }

    pub fn pointer<S: Into<ScopeId>>(
        name: impl Into<String>,
        object_lists: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Pointer,
            required: false,
            default: None,
            object_lists: object_lists.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Description of one record type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Repeating group appended after the fixed fields.
    #[serde(default)]
    pub extensible: Vec<FieldSpec>,
    /// Naming scopes this type's records belong to.
    #[serde(default)]
    pub references: Vec<ScopeId>,
    #[serde(default)]
    pub name_field: Option<usize>,
    #[serde(default)]
    pub min_fields: Option<usize>,
    #[serde(default)]
    pub max_fields: Option<usize>,
    #[serde(default)]
    pub unique: bool,
    /// At least one record of this type must exist in a valid store.
    #[serde(default)]
    pub required: bool,
}

impl RecordTypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            extensible: Vec::new(),
            references: Vec::new(),
            name_field: None,
            min_fields: None,
            max_fields: None,
            unique: false,
            required: false,
        }
    }

    /// Append a required scalar `Name` field and mark it as the name field.
    pub fn with_name_field(mut self) -> Self {
        self.name_field = Some(self.fields.len());
        self.fields.push(FieldSpec::scalar("Name").required());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn extensible_field(mut self, field: FieldSpec) -> Self {
        self.extensible.push(field);
        self
    }

    pub fn references<S: Into<ScopeId>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.references.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn min_fields(mut self, n: usize) -> Self {
        self.min_fields = Some(n);
        self
    }

    pub fn max_fields(mut self, n: usize) -> Self {
        self.max_fields = Some(n);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required_type(mut self) -> Self {
        self.required = true;
        self
    }

    fn layout(&self) -> RecordLayout {
        RecordLayout {
            fixed_fields: self.fields.len(),
            extensible_group: (!self.extensible.is_empty()).then_some(self.extensible.len()),
            min_fields: self.min_fields.unwrap_or(self.fields.len()),
            max_fields: self.max_fields,
            name_field: self.name_field,
        }
    }

    fn field_spec(&self, index: usize) -> Option<&FieldSpec> {
        if let Some(max) = self.max_fields {
            if index >= max {
                return None;
            }
        }
        if let Some(field) = self.fields.get(index) {
            return Some(field);
        }
        if self.extensible.is_empty() {
            return None;
        }
        let offset = (index - self.fields.len()) % self.extensible.len();
        self.extensible.get(offset)
    }

    fn check(&self) -> SchemaResult<()> {
        let invalid = |reason: String| SchemaError::InvalidLayout {
            record_type: self.name.clone(),
            reason,
        };
        if let Some(index) = self.name_field {
            match self.fields.get(index) {
                Some(field) if field.kind == FieldKind::Scalar => {}
                Some(_) => return Err(invalid(format!("name field {index} is not a scalar"))),
                None => return Err(invalid(format!("name field {index} is not a fixed field"))),
            }
        }
        if let Some(min) = self.min_fields {
            if self.extensible.is_empty() && min > self.fields.len() {
                return Err(invalid(format!(
                    "min_fields {min} exceeds {} fixed fields",
                    self.fields.len()
                )));
            }
            if let Some(max) = self.max_fields {
                if min > max {
                    return Err(invalid(format!("min_fields {min} exceeds max_fields {max}")));
                }
            }
        }
        for field in self.fields.iter().chain(&self.extensible) {
            if field.kind == FieldKind::Pointer && field.object_lists.is_empty() {
                return Err(invalid(format!("pointer field {:?} accepts no scopes", field.name)));
            }
        }
        Ok(())
    }
}

/// Lookup-table schema: a map from record type to [`RecordTypeSpec`].
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    types: BTreeMap<RecordType, RecordTypeSpec>,
    /// Naming scope → record types that declare it.
    scope_members: BTreeMap<ScopeId, BTreeSet<RecordType>>,
}

impl TableSchema {
    /// Build a schema from type specs, rejecting duplicates and bad layouts.
    pub fn new(specs: impl IntoIterator<Item = RecordTypeSpec>) -> SchemaResult<Self> {
        let mut types = BTreeMap::new();
        let mut scope_members: BTreeMap<ScopeId, BTreeSet<RecordType>> = BTreeMap::new();

        for spec in specs {
            spec.check()?;
            let key = RecordType::new(spec.name.clone())?;
            if types.contains_key(&key) {
                return Err(SchemaError::DuplicateType(spec.name));
            }
            for scope in &spec.references {
                scope_members
                    .entry(scope.clone())
                    .or_default()
                    .insert(key.clone());
            }
            types.insert(key, spec);
        }

        debug!(types = types.len(), scopes = scope_members.len(), "schema built");
        Ok(Self {
            types,
            scope_members,
        })
    }

    /// Number of record types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if the schema has no record types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The spec for a record type.
    pub fn spec(&self, record_type: &RecordType) -> Option<&RecordTypeSpec> {
        self.types.get(record_type)
    }

    /// All record type keys, sorted.
    pub fn record_types(&self) -> impl Iterator<Item = &RecordType> {
        self.types.keys()
    }

    fn field_spec(&self, record_type: &RecordType, index: usize) -> Option<&FieldSpec> {
        self.types.get(record_type)?.field_spec(index)
    }
}

impl SchemaOracle for TableSchema {
    fn layout(&self, record_type: &RecordType) -> Option<RecordLayout> {
        self.types.get(record_type).map(RecordTypeSpec::layout)
    }

    fn field_kind(&self, record_type: &RecordType, index: usize) -> Option<FieldKind> {
        self.field_spec(record_type, index).map(|f| f.kind)
    }

    fn legal_target_types(&self, record_type: &RecordType, index: usize) -> BTreeSet<RecordType> {
        let Some(field) = self.field_spec(record_type, index) else {
            return BTreeSet::new();
        };
        if field.kind != FieldKind::Pointer {
            return BTreeSet::new();
        }
        field
            .object_lists
            .iter()
            .filter_map(|scope| self.scope_members.get(scope))
            .flatten()
            .cloned()
            .collect()
    }

    fn is_required(&self, record_type: &RecordType, index: usize) -> bool {
        self.field_spec(record_type, index)
            .is_some_and(|f| f.required)
    }

    fn default_text(&self, record_type: &RecordType, index: usize) -> Option<String> {
        self.field_spec(record_type, index)?.default.clone()
    }

    fn naming_scopes(&self, record_type: &RecordType) -> BTreeSet<ScopeId> {
        self.types
            .get(record_type)
            .map(|spec| spec.references.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn is_unique(&self, record_type: &RecordType) -> bool {
        self.types.get(record_type).is_some_and(|s| s.unique)
    }

    fn required_types(&self) -> Vec<RecordType> {
        self.types
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(key, _)| key.clone())
            .collect()
    }
}
