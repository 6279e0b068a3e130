//! The data model (schema description) a submission is validated against.
//!
//! A data model enumerates tables with their ordered fields and a constraints
//! block with four lists: foreign keys, not-null, uniques and primary keys.
//! It is read from the JSON document published by the data-models service.
//! Constraint definitions are read-only facts; the engine never mutates them.

use crate::error::{CdmError, Result};
use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// A versioned schema description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModel {
    /// Model name, e.g. `pedsnet`
    #[serde(default)]
    pub model: String,
    /// Model version, e.g. `5.7.0`
    #[serde(default)]
    pub version: String,
    /// Tables in declared order
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub schema: SchemaSection,
}

/// The `schema` block of a data model document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSection {
    #[serde(default)]
    pub constraints: Constraints,
}

/// Declared constraints, each list in declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
    #[serde(default)]
    pub not_null: Vec<NotNullDef>,
    #[serde(default)]
    pub uniques: Vec<UniqueDef>,
    #[serde(default)]
    pub primary_keys: Vec<PrimaryKeyDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TableDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

impl FieldDef {
    /// The Arrow type a submission column declared with this field is loaded as.
    ///
    /// Unrecognized declared types load as strings.
    pub fn arrow_type(&self) -> DataType {
        match self.data_type.to_ascii_lowercase().as_str() {
            "integer" | "biginteger" => DataType::Int64,
            "number" | "decimal" | "float" => DataType::Float64,
            "date" => DataType::Date32,
            "datetime" | "timestamp" => DataType::Timestamp(TimeUnit::Microsecond, None),
            "boolean" => DataType::Boolean,
            _ => DataType::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub source_table: String,
    pub source_field: String,
    pub target_table: String,
    pub target_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotNullDef {
    pub table: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueDef {
    pub table: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyDef {
    pub table: String,
    /// Key columns in key order
    pub fields: Vec<String>,
}

impl DataModel {
    /// Parses a data model from its JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: DataModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Reads a data model from a local JSON file.
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model = Self::from_json_str(&json)?;
        info!(
            model = %model.model,
            version = %model.version,
            tables = model.tables.len(),
            "data model loaded"
        );
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(CdmError::Schema(
                "data model declares no tables".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(CdmError::Schema(format!(
                    "table '{}' is declared more than once",
                    table.name
                )));
            }
        }
        for pk in &self.schema.constraints.primary_keys {
            if pk.fields.is_empty() {
                return Err(CdmError::Schema(format!(
                    "primary key of table '{}' has no fields",
                    pk.table
                )));
            }
        }
        Ok(())
    }

    /// All table names in declared order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Column names of a table in declared order.
    pub fn column_names(&self, table: &str) -> Result<Vec<&str>> {
        self.table(table)
            .map(TableDef::column_names)
            .ok_or_else(|| {
                CdmError::Schema(format!("Table '{table}' not found in the data model"))
            })
    }

    pub fn constraints(&self) -> &Constraints {
        &self.schema.constraints
    }
}
