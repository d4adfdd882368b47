//! core::error
//!
//! Error taxonomy shared by the catalog, variation graph, run-range index,
//! assignment store and resolution engine.
//!
//! # Categories
//!
//! - **Lookup**: `NotFound` is recoverable; the caller decides on a fallback.
//! - **Data**: `ArityMismatch`, `InvalidCell` indicate corrupt or mismatched data.
//! - **Structure**: `CycleDetected`, `DanglingParent`, `DuplicateColumnOrder`
//!   and friends indicate a corrupt record set and are fatal to the operation
//!   that discovered them.
//!
//! Every variant names the entity kind and the id or key that triggered it.

use thiserror::Error;

use super::types::{ConstantSetId, TypeError, TypeTableId};

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Directory,
    TypeTable,
    Column,
    ConstantSet,
    Assignment,
    RunRange,
    Variation,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Entity::Directory => "directory",
            Entity::TypeTable => "type table",
            Entity::Column => "column",
            Entity::ConstantSet => "constant set",
            Entity::Assignment => "assignment",
            Entity::RunRange => "run range",
            Entity::Variation => "variation",
        };
        f.write_str(s)
    }
}

/// Errors from building or querying the constants store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibError {
    /// A path, name or id could not be resolved, or no record satisfies a query.
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    /// Flat data length is not a multiple of the column count. Names the
    /// constant set when the data came from a stored one.
    #[error(
        "cannot reshape {cells} cells into rows of {columns} columns{}",
        set_suffix(.constant_set_id)
    )]
    ArityMismatch {
        cells: usize,
        columns: usize,
        constant_set_id: Option<ConstantSetId>,
    },

    /// Following parent pointers from `id` never reaches a root.
    #[error("cycle detected in {entity} parent chain at id {id}")]
    CycleDetected { entity: Entity, id: u64 },

    /// A non-root parent id has no matching record.
    #[error("{entity} {id} references missing parent {parent_id}")]
    DanglingParent {
        entity: Entity,
        id: u64,
        parent_id: u64,
    },

    /// Two records of one kind share an id.
    #[error("duplicate {entity} id {id}")]
    DuplicateId { entity: Entity, id: u64 },

    /// Two columns of one table share an `order` value.
    #[error("type table {table_id} has duplicate column order {order}")]
    DuplicateColumnOrder { table_id: TypeTableId, order: i64 },

    /// Two directories or two tables resolve to the same path.
    #[error("duplicate path: {path}")]
    DuplicatePath { path: String },

    /// Two records of a name-indexed kind share a name.
    #[error("duplicate {entity} name: {name}")]
    DuplicateName { entity: Entity, name: String },

    /// A table's declared column count disagrees with its column records.
    #[error("type table {table_id} declares {declared} columns but has {actual}")]
    ColumnCountMismatch {
        table_id: TypeTableId,
        declared: usize,
        actual: usize,
    },

    /// A run range with `min > max`.
    #[error("run range {id} is inverted: {min} > {max}")]
    InvalidRunRange { id: u64, min: i64, max: i64 },

    /// More than one assignment claims the same constant set.
    #[error("constant set {constant_set_id} is owned by more than one assignment")]
    DuplicateOwner { constant_set_id: ConstantSetId },

    /// A record name failed validation.
    #[error("{0}")]
    InvalidName(#[from] TypeError),

    /// A search pattern could not be compiled.
    #[error("invalid search pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A decoded cell could not be parsed as its column type.
    #[error("column '{column}': cannot parse '{value}' as {expected}")]
    InvalidCell {
        column: String,
        value: String,
        expected: String,
    },
}

impl CalibError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: Entity, key: impl Into<String>) -> Self {
        CalibError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Attach the owning constant set to an `ArityMismatch`. Other errors
    /// pass through unchanged.
    pub fn in_constant_set(self, id: ConstantSetId) -> Self {
        match self {
            CalibError::ArityMismatch { cells, columns, .. } => CalibError::ArityMismatch {
                cells,
                columns,
                constant_set_id: Some(id),
            },
            other => other,
        }
    }

    /// Whether this error is a recoverable lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CalibError::NotFound { .. })
    }
}

fn set_suffix(id: &Option<ConstantSetId>) -> String {
    id.map(|id| format!(" in constant set {id}")).unwrap_or_default()
}

/// Result alias used throughout the crate.
pub type CalibResult<T> = Result<T, CalibError>;
