//! store
//!
//! Append-only assignment store.
//!
//! # Architecture
//!
//! Each assignment owns exactly one constant set (one encoded blob) and
//! references a run range and a variation. Assignments are never edited or
//! removed here; pruning and compaction belong to external maintenance tools
//! that hand back a fresh record set.
//!
//! # Atomicity
//!
//! The log sits behind an `RwLock`. [`AssignmentStore::append`] inserts the
//! constant set and the assignment in one write-lock acquisition, so a
//! concurrent reader sees either neither or both. Readers take the read lock
//! only for the duration of a scan.
//!
//! # Example
//!
//! ```
//! use calibdb::core::types::{RunRangeId, TypeTableId, UtcTimestamp, VariationId};
//! use calibdb::store::{AssignmentStore, NewAssignment};
//!
//! let store = AssignmentStore::new();
//! let id = store.append(NewAssignment {
//!     type_table_id: TypeTableId::new(1),
//!     run_range_id: RunRangeId::new(1),
//!     variation_id: VariationId::new(1),
//!     created: UtcTimestamp::from_unix(1_000).unwrap(),
//!     vault: "1|2|3".into(),
//! });
//! assert_eq!(store.get(id).unwrap().id, id);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::error::{CalibError, CalibResult, Entity};
use crate::core::records::{AssignmentRecord, ConstantSetRecord};
use crate::core::types::{
    AssignmentId, ConstantSetId, RunRangeId, TypeTableId, UtcTimestamp, VariationId,
};

/// An immutable assignment, joined with its constant set's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub constant_set_id: ConstantSetId,
    pub type_table_id: TypeTableId,
    pub run_range_id: RunRangeId,
    pub variation_id: VariationId,
    pub created: UtcTimestamp,
}

/// One encoded blob of table data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSet {
    pub id: ConstantSetId,
    pub type_table_id: TypeTableId,
    pub vault: String,
}

/// Input for [`AssignmentStore::append`]; ids are allocated by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub type_table_id: TypeTableId,
    pub run_range_id: RunRangeId,
    pub variation_id: VariationId,
    pub created: UtcTimestamp,
    /// Already-encoded blob
    pub vault: String,
}

#[derive(Debug, Default)]
struct Log {
    assignments: BTreeMap<AssignmentId, Assignment>,
    constant_sets: HashMap<ConstantSetId, ConstantSet>,
    by_table: HashMap<TypeTableId, Vec<AssignmentId>>,
    next_assignment: u64,
    next_constant_set: u64,
}

impl Log {
    fn insert(&mut self, assignment: Assignment, set: ConstantSet) {
        self.next_assignment = self.next_assignment.max(assignment.id.get() + 1);
        self.next_constant_set = self.next_constant_set.max(set.id.get() + 1);
        self.by_table
            .entry(assignment.type_table_id)
            .or_default()
            .push(assignment.id);
        self.constant_sets.insert(set.id, set);
        self.assignments.insert(assignment.id, assignment);
    }
}

/// Append-only store of assignments and their constant sets.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    log: RwLock<Log>,
}

impl AssignmentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from constant-set and assignment records.
    ///
    /// Constant sets that no assignment owns are skipped.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` if two assignment records share an id
    /// - `DanglingParent` if an assignment names a missing constant set
    /// - `DuplicateOwner` if two assignments claim one constant set
    pub fn from_records(
        constant_sets: &[ConstantSetRecord],
        assignments: &[AssignmentRecord],
    ) -> CalibResult<Self> {
        let sets: HashMap<ConstantSetId, &ConstantSetRecord> =
            constant_sets.iter().map(|s| (s.id, s)).collect();
        let mut owned = BTreeSet::new();
        let mut log = Log::default();

        for record in assignments {
            if log.assignments.contains_key(&record.id) {
                return Err(CalibError::DuplicateId {
                    entity: Entity::Assignment,
                    id: record.id.get(),
                });
            }
            let set = sets
                .get(&record.constant_set_id)
                .ok_or(CalibError::DanglingParent {
                    entity: Entity::Assignment,
                    id: record.id.get(),
                    parent_id: record.constant_set_id.get(),
                })?;
            if !owned.insert(record.constant_set_id) {
                return Err(CalibError::DuplicateOwner {
                    constant_set_id: record.constant_set_id,
                });
            }
            log.insert(
                Assignment {
                    id: record.id,
                    constant_set_id: set.id,
                    type_table_id: set.type_table_id,
                    run_range_id: record.run_range_id,
                    variation_id: record.variation_id,
                    created: record.created,
                },
                ConstantSet {
                    id: set.id,
                    type_table_id: set.type_table_id,
                    vault: set.vault.clone(),
                },
            );
        }

        let orphans = constant_sets.len() - owned.len().min(constant_sets.len());
        if orphans > 0 {
            tracing::warn!(orphans, "skipped constant sets without an owning assignment");
        }

        Ok(Self {
            log: RwLock::new(log),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Log> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Log> {
        self.log.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an assignment and its constant set atomically.
    ///
    /// The caller validates references and blob arity beforehand.
    pub fn append(&self, new: NewAssignment) -> AssignmentId {
        let mut log = self.write();
        let assignment_id = AssignmentId::new(log.next_assignment.max(1));
        let set_id = ConstantSetId::new(log.next_constant_set.max(1));

        log.insert(
            Assignment {
                id: assignment_id,
                constant_set_id: set_id,
                type_table_id: new.type_table_id,
                run_range_id: new.run_range_id,
                variation_id: new.variation_id,
                created: new.created,
            },
            ConstantSet {
                id: set_id,
                type_table_id: new.type_table_id,
                vault: new.vault,
            },
        );

        tracing::info!(
            assignment = %assignment_id,
            constant_set = %set_id,
            table = %new.type_table_id,
            "appended assignment"
        );
        assignment_id
    }

    /// Assignments of `table` whose run range is in `run_ranges` and which
    /// were created no later than `as_of`. `None` applies no cutoff.
    pub fn candidates(
        &self,
        table: TypeTableId,
        run_ranges: &BTreeSet<RunRangeId>,
        as_of: Option<UtcTimestamp>,
    ) -> Vec<Assignment> {
        let log = self.read();
        log.by_table
            .get(&table)
            .into_iter()
            .flatten()
            .filter_map(|id| log.assignments.get(id))
            .filter(|a| run_ranges.contains(&a.run_range_id))
            .filter(|a| as_of.map_or(true, |cutoff| a.created <= cutoff))
            .cloned()
            .collect()
    }

    /// Every assignment of `table`, in insertion order.
    pub fn for_table(&self, table: TypeTableId) -> Vec<Assignment> {
        let log = self.read();
        log.by_table
            .get(&table)
            .into_iter()
            .flatten()
            .filter_map(|id| log.assignments.get(id))
            .cloned()
            .collect()
    }

    /// Look up an assignment by id.
    pub fn get(&self, id: AssignmentId) -> Option<Assignment> {
        self.read().assignments.get(&id).cloned()
    }

    /// Look up a constant set by id.
    pub fn constant_set(&self, id: ConstantSetId) -> Option<ConstantSet> {
        self.read().constant_sets.get(&id).cloned()
    }

    /// Number of stored assignments.
    pub fn len(&self) -> usize {
        self.read().assignments.len()
    }

    /// Whether the store holds no assignments.
    pub fn is_empty(&self) -> bool {
        self.read().assignments.is_empty()
    }

    /// Export the store back into records.
    pub fn to_records(&self) -> (Vec<ConstantSetRecord>, Vec<AssignmentRecord>) {
        let log = self.read();
        let mut sets: Vec<ConstantSetRecord> = log
            .constant_sets
            .values()
            .map(|s| ConstantSetRecord {
                id: s.id,
                type_table_id: s.type_table_id,
                vault: s.vault.clone(),
            })
            .collect();
        sets.sort_by_key(|s| s.id);

        let assignments = log
            .assignments
            .values()
            .map(|a| AssignmentRecord {
                id: a.id,
                constant_set_id: a.constant_set_id,
                run_range_id: a.run_range_id,
                variation_id: a.variation_id,
                created: a.created,
            })
            .collect();

        (sets, assignments)
    }
}
