//! TOML schema files.
//!
//! ```toml
//! [[types]]
//! name = "Zone"
//! name_field = 0
//! references = ["ZoneNames"]
//!
//! [[types.fields]]
//! name = "Name"
//! kind = "scalar"
//! required = true
//!
//! [[types.fields]]
//! name = "Space Type"
//! kind = "pointer"
//! object_lists = ["SpaceTypeNames"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SchemaError, SchemaResult};
use crate::table::{RecordTypeSpec, TableSchema};

/// On-disk form of a [`TableSchema`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<RecordTypeSpec>,
}

impl SchemaFile {
    /// Parse a schema file from TOML text.
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a schema file.
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::from_toml_str(&text)?;
        info!(path = %path.display(), types = file.types.len(), "schema file loaded");
        Ok(file)
    }

    /// Build the lookup-table schema.
    pub fn into_schema(self) -> SchemaResult<TableSchema> {
        TableSchema::new(self.types)
    }
}
