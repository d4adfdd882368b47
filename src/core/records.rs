//! core::records
//!
//! Plain records mirroring the backing store's logical schema.
//!
//! # Schema
//!
//! | Record | Key fields |
//! |---|---|
//! | [`DirectoryRecord`] | id, name, parent_id, comment, created, modified |
//! | [`TypeTableRecord`] | id, name, directory_id, row_count, column_count, comment |
//! | [`ColumnRecord`] | id, type_table_id, name, order, column_type |
//! | [`ConstantSetRecord`] | id, type_table_id, vault |
//! | [`AssignmentRecord`] | id, constant_set_id, run_range_id, variation_id, created |
//! | [`RunRangeRecord`] | id, name, min, max |
//! | [`VariationRecord`] | id, name, parent_id |
//!
//! Records carry ids, never object references. Relationships are resolved
//! through the indexes built by the catalog, variation graph and stores.
//!
//! A `parent_id` of `0`, `null` or a missing field all mean "root".
//!
//! # Example
//!
//! ```
//! use calibdb::core::records::RecordSet;
//!
//! let json = r#"{
//!     "directories": [{ "id": 1, "name": "CDC", "parent_id": 0 }],
//!     "variations": [{ "id": 1, "name": "default" }]
//! }"#;
//! let records = RecordSet::from_json(json).unwrap();
//! assert_eq!(records.directories.len(), 1);
//! assert!(records.directories[0].parent_id.is_none());
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use super::codec::ColumnType;
use super::types::{
    AssignmentId, ColumnId, ConstantSetId, DirectoryId, RunRangeId, TypeTableId, UtcTimestamp,
    VariationId,
};

/// Treat `0` and `null` as "no parent".
fn zero_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<u64>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != 0).map(T::from))
}

/// A row of `directories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub id: DirectoryId,
    pub name: String,
    #[serde(default, deserialize_with = "zero_as_none")]
    pub parent_id: Option<DirectoryId>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created: Option<UtcTimestamp>,
    #[serde(default)]
    pub modified: Option<UtcTimestamp>,
}

impl DirectoryRecord {
    /// A directory with no comment or timestamps.
    pub fn new(id: u64, name: impl Into<String>, parent_id: Option<u64>) -> Self {
        Self {
            id: DirectoryId::new(id),
            name: name.into(),
            parent_id: parent_id.filter(|p| *p != 0).map(DirectoryId::new),
            comment: String::new(),
            created: None,
            modified: None,
        }
    }
}

/// A row of `type_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTableRecord {
    pub id: TypeTableId,
    pub name: String,
    pub directory_id: DirectoryId,
    #[serde(default)]
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub comment: String,
}

impl TypeTableRecord {
    /// A table with no comment.
    pub fn new(
        id: u64,
        name: impl Into<String>,
        directory_id: u64,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        Self {
            id: TypeTableId::new(id),
            name: name.into(),
            directory_id: DirectoryId::new(directory_id),
            row_count,
            column_count,
            comment: String::new(),
        }
    }
}

/// A row of `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: ColumnId,
    pub type_table_id: TypeTableId,
    pub name: String,
    pub order: i64,
    pub column_type: ColumnType,
}

impl ColumnRecord {
    pub fn new(
        id: u64,
        type_table_id: u64,
        name: impl Into<String>,
        order: i64,
        column_type: ColumnType,
    ) -> Self {
        Self {
            id: ColumnId::new(id),
            type_table_id: TypeTableId::new(type_table_id),
            name: name.into(),
            order,
            column_type,
        }
    }
}

/// A row of `constant_sets`: one encoded blob for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantSetRecord {
    pub id: ConstantSetId,
    pub type_table_id: TypeTableId,
    pub vault: String,
}

/// A row of `assignments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: AssignmentId,
    pub constant_set_id: ConstantSetId,
    pub run_range_id: RunRangeId,
    pub variation_id: VariationId,
    pub created: UtcTimestamp,
}

/// A row of `run_ranges`: the closed interval `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRangeRecord {
    pub id: RunRangeId,
    #[serde(default)]
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl RunRangeRecord {
    pub fn new(id: u64, name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            id: RunRangeId::new(id),
            name: name.into(),
            min,
            max,
        }
    }
}

/// A row of `variations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationRecord {
    pub id: VariationId,
    pub name: String,
    #[serde(default, deserialize_with = "zero_as_none")]
    pub parent_id: Option<VariationId>,
    #[serde(default)]
    pub comment: String,
}

impl VariationRecord {
    pub fn new(id: u64, name: impl Into<String>, parent_id: Option<u64>) -> Self {
        Self {
            id: VariationId::new(id),
            name: name.into(),
            parent_id: parent_id.filter(|p| *p != 0).map(VariationId::new),
            comment: String::new(),
        }
    }
}

/// A fully materialized record set, as produced by the loading collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    pub directories: Vec<DirectoryRecord>,
    pub type_tables: Vec<TypeTableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub constant_sets: Vec<ConstantSetRecord>,
    pub assignments: Vec<AssignmentRecord>,
    pub run_ranges: Vec<RunRangeRecord>,
    pub variations: Vec<VariationRecord>,
}

impl RecordSet {
    /// Parse a record set from its JSON interchange form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to the JSON interchange form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
