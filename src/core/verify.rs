//! core::verify
//!
//! Whole-record-set integrity checks.
//!
//! Index builders stop at the first problem they hit. [`verify_records`]
//! instead walks the entire set and reports every violation it finds, which
//! is what a maintenance tool wants before importing or after pruning.
//!
//! # Checks
//!
//! - Unique ids per record kind
//! - Directory and variation parent chains are acyclic and end at a root
//! - Tables reference existing directories; columns reference existing tables
//! - Column `order` is unique per table and the count matches `column_count`
//! - Run ranges satisfy `min <= max`
//! - Constant sets reference existing tables and decode to a whole number
//!   of rows
//! - Assignments reference existing constant sets, run ranges and variations,
//!   and own their constant set exclusively
//!
//! # Invariants
//!
//! - Never mutates its input
//! - Deterministic: the same set yields the same errors in the same order

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use super::codec::decode;
use super::error::{CalibError, Entity};
use super::graph::ParentGraph;
use super::records::RecordSet;
use super::types::{ConstantSetId, DirectoryId, TypeTableId, VariationId};

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyResult {
    /// Whether verification passed
    pub ok: bool,
    /// Every violation found, in check order
    pub errors: Vec<CalibError>,
}

impl VerifyResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failed result with errors.
    pub fn failure(errors: Vec<CalibError>) -> Self {
        Self { ok: false, errors }
    }

    fn from_errors(errors: Vec<CalibError>) -> Self {
        if errors.is_empty() {
            Self::success()
        } else {
            Self::failure(errors)
        }
    }
}

/// Verify a record set, collecting every violation.
///
/// # Example
///
/// ```
/// use calibdb::core::records::{RecordSet, RunRangeRecord, VariationRecord};
/// use calibdb::core::verify::verify_records;
///
/// let records = RecordSet {
///     run_ranges: vec![RunRangeRecord::new(1, "", 10, 5)],
///     variations: vec![VariationRecord::new(1, "default", Some(7))],
///     ..Default::default()
/// };
/// let result = verify_records(&records);
/// assert!(!result.ok);
/// assert_eq!(result.errors.len(), 2);
/// ```
pub fn verify_records(records: &RecordSet) -> VerifyResult {
    let mut errors = Vec::new();

    check_ids(records, &mut errors);
    check_directories(records, &mut errors);
    check_variations(records, &mut errors);
    check_tables(records, &mut errors);
    check_run_ranges(records, &mut errors);
    check_constant_sets(records, &mut errors);
    check_assignments(records, &mut errors);

    for error in &errors {
        tracing::warn!(%error, "record set violation");
    }
    VerifyResult::from_errors(errors)
}

fn duplicates<K: Copy + Eq + Hash + Ord>(ids: impl Iterator<Item = K>) -> Vec<K> {
    let mut seen = HashSet::new();
    let mut dupes: Vec<K> = ids.filter(|id| !seen.insert(*id)).collect();
    dupes.sort();
    dupes.dedup();
    dupes
}

fn check_ids(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let mut push = |entity, ids: Vec<u64>| {
        errors.extend(ids.into_iter().map(|id| CalibError::DuplicateId { entity, id }));
    };
    push(
        Entity::Directory,
        duplicates(records.directories.iter().map(|r| r.id.get())),
    );
    push(
        Entity::TypeTable,
        duplicates(records.type_tables.iter().map(|r| r.id.get())),
    );
    push(
        Entity::Column,
        duplicates(records.columns.iter().map(|r| r.id.get())),
    );
    push(
        Entity::ConstantSet,
        duplicates(records.constant_sets.iter().map(|r| r.id.get())),
    );
    push(
        Entity::Assignment,
        duplicates(records.assignments.iter().map(|r| r.id.get())),
    );
    push(
        Entity::RunRange,
        duplicates(records.run_ranges.iter().map(|r| r.id.get())),
    );
    push(
        Entity::Variation,
        duplicates(records.variations.iter().map(|r| r.id.get())),
    );
}

fn check_parents<K>(graph: &ParentGraph<K>, entity: Entity, errors: &mut Vec<CalibError>)
where
    K: Copy + Eq + Hash + Ord + Into<u64>,
{
    for (node, parent) in graph.dangling() {
        errors.push(CalibError::DanglingParent {
            entity,
            id: node.into(),
            parent_id: parent.into(),
        });
    }
    if let Some(node) = graph.find_cycle() {
        errors.push(CalibError::CycleDetected {
            entity,
            id: node.into(),
        });
    }
}

fn check_directories(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let mut graph: ParentGraph<DirectoryId> = ParentGraph::new();
    for dir in &records.directories {
        graph.add_node(dir.id, dir.parent_id);
    }
    check_parents(&graph, Entity::Directory, errors);
}

fn check_variations(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let mut graph: ParentGraph<VariationId> = ParentGraph::new();
    let mut names = HashSet::new();
    for variation in &records.variations {
        graph.add_node(variation.id, variation.parent_id);
        if !names.insert(variation.name.as_str()) {
            errors.push(CalibError::DuplicateName {
                entity: Entity::Variation,
                name: variation.name.clone(),
            });
        }
    }
    check_parents(&graph, Entity::Variation, errors);
}

fn check_tables(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let directories: HashSet<DirectoryId> = records.directories.iter().map(|d| d.id).collect();
    let tables: HashSet<TypeTableId> = records.type_tables.iter().map(|t| t.id).collect();

    let mut orders: BTreeMap<TypeTableId, Vec<i64>> = BTreeMap::new();
    for column in &records.columns {
        if !tables.contains(&column.type_table_id) {
            errors.push(CalibError::DanglingParent {
                entity: Entity::Column,
                id: column.id.get(),
                parent_id: column.type_table_id.get(),
            });
            continue;
        }
        orders
            .entry(column.type_table_id)
            .or_default()
            .push(column.order);
    }

    for table in &records.type_tables {
        if !directories.contains(&table.directory_id) {
            errors.push(CalibError::DanglingParent {
                entity: Entity::TypeTable,
                id: table.id.get(),
                parent_id: table.directory_id.get(),
            });
        }

        let table_orders = orders.get(&table.id).map(Vec::as_slice).unwrap_or_default();
        for order in duplicates(table_orders.iter().copied()) {
            errors.push(CalibError::DuplicateColumnOrder {
                table_id: table.id,
                order,
            });
        }
        if table_orders.len() != table.column_count {
            errors.push(CalibError::ColumnCountMismatch {
                table_id: table.id,
                declared: table.column_count,
                actual: table_orders.len(),
            });
        }
    }
}

fn check_run_ranges(records: &RecordSet, errors: &mut Vec<CalibError>) {
    errors.extend(
        records
            .run_ranges
            .iter()
            .filter(|r| r.min > r.max)
            .map(|r| CalibError::InvalidRunRange {
                id: r.id.get(),
                min: r.min,
                max: r.max,
            }),
    );
}

fn check_constant_sets(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let column_counts: HashMap<TypeTableId, usize> = records
        .type_tables
        .iter()
        .map(|t| (t.id, t.column_count))
        .collect();

    for set in &records.constant_sets {
        let Some(&columns) = column_counts.get(&set.type_table_id) else {
            errors.push(CalibError::DanglingParent {
                entity: Entity::ConstantSet,
                id: set.id.get(),
                parent_id: set.type_table_id.get(),
            });
            continue;
        };
        let cells = decode(&set.vault).len();
        if columns == 0 || cells % columns != 0 {
            errors.push(CalibError::ArityMismatch {
                cells,
                columns,
                constant_set_id: Some(set.id),
            });
        }
    }
}

fn check_assignments(records: &RecordSet, errors: &mut Vec<CalibError>) {
    let sets: HashSet<ConstantSetId> = records.constant_sets.iter().map(|s| s.id).collect();
    let ranges: HashSet<_> = records.run_ranges.iter().map(|r| r.id).collect();
    let variations: HashSet<_> = records.variations.iter().map(|v| v.id).collect();

    for assignment in &records.assignments {
        let id = assignment.id.get();
        if !sets.contains(&assignment.constant_set_id) {
            errors.push(CalibError::DanglingParent {
                entity: Entity::Assignment,
                id,
                parent_id: assignment.constant_set_id.get(),
            });
        }
        if !ranges.contains(&assignment.run_range_id) {
            errors.push(CalibError::DanglingParent {
                entity: Entity::Assignment,
                id,
                parent_id: assignment.run_range_id.get(),
            });
        }
        if !variations.contains(&assignment.variation_id) {
            errors.push(CalibError::DanglingParent {
                entity: Entity::Assignment,
                id,
                parent_id: assignment.variation_id.get(),
            });
        }
    }

    for constant_set_id in duplicates(records.assignments.iter().map(|a| a.constant_set_id)) {
        errors.push(CalibError::DuplicateOwner { constant_set_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::ColumnType;
    use crate::core::records::*;
    use crate::core::types::{AssignmentId, RunRangeId, UtcTimestamp};

    fn assignment(id: u64, set: u64, range: u64, variation: u64) -> AssignmentRecord {
        AssignmentRecord {
            id: AssignmentId::new(id),
            constant_set_id: ConstantSetId::new(set),
            run_range_id: RunRangeId::new(range),
            variation_id: VariationId::new(variation),
            created: UtcTimestamp::from_unix(0).unwrap(),
        }
    }

    fn constant_set(id: u64, table: u64, vault: &str) -> ConstantSetRecord {
        ConstantSetRecord {
            id: ConstantSetId::new(id),
            type_table_id: TypeTableId::new(table),
            vault: vault.into(),
        }
    }

    fn valid() -> RecordSet {
        RecordSet {
            directories: vec![
                DirectoryRecord::new(1, "CDC", None),
                DirectoryRecord::new(2, "gains", Some(1)),
            ],
            type_tables: vec![TypeTableRecord::new(1, "base", 2, 1, 2)],
            columns: vec![
                ColumnRecord::new(1, 1, "x", 0, ColumnType::Double),
                ColumnRecord::new(2, 1, "y", 1, ColumnType::Double),
            ],
            constant_sets: vec![constant_set(1, 1, "1|2")],
            assignments: vec![assignment(1, 1, 1, 1)],
            run_ranges: vec![RunRangeRecord::new(1, "all", 0, 100)],
            variations: vec![VariationRecord::new(1, "default", None)],
        }
    }

    #[test]
    fn valid_set_passes() {
        let result = verify_records(&valid());
        assert!(result.ok, "{:?}", result.errors);
        assert_eq!(result, VerifyResult::success());
    }

    #[test]
    fn empty_set_passes() {
        assert!(verify_records(&RecordSet::default()).ok);
    }

    #[test]
    fn reports_all_violations_not_just_first() {
        let mut records = valid();
        records.run_ranges.push(RunRangeRecord::new(2, "", 9, 1));
        records.constant_sets.push(constant_set(2, 1, "1|2|3"));
        records.assignments.push(assignment(2, 1, 1, 1));

        let result = verify_records(&records);
        assert!(!result.ok);
        assert_eq!(
            result.errors,
            vec![
                CalibError::InvalidRunRange {
                    id: 2,
                    min: 9,
                    max: 1
                },
                CalibError::ArityMismatch {
                    cells: 3,
                    columns: 2,
                    constant_set_id: Some(ConstantSetId::new(2)),
                },
                CalibError::DuplicateOwner {
                    constant_set_id: ConstantSetId::new(1)
                },
            ]
        );
    }

    #[test]
    fn directory_cycle_and_dangling_parent() {
        let mut records = valid();
        records.directories = vec![
            DirectoryRecord::new(1, "a", Some(2)),
            DirectoryRecord::new(2, "b", Some(1)),
            DirectoryRecord::new(3, "c", Some(9)),
        ];
        records.type_tables[0].directory_id = DirectoryId::new(3);

        let errors = verify_records(&records).errors;
        assert!(errors.contains(&CalibError::DanglingParent {
            entity: Entity::Directory,
            id: 3,
            parent_id: 9
        }));
        assert!(errors.contains(&CalibError::CycleDetected {
            entity: Entity::Directory,
            id: 1
        }));
    }

    #[test]
    fn variation_cycle_detected() {
        let mut records = valid();
        records.variations = vec![
            VariationRecord::new(1, "default", Some(2)),
            VariationRecord::new(2, "mc", Some(1)),
        ];
        let errors = verify_records(&records).errors;
        assert_eq!(
            errors,
            vec![CalibError::CycleDetected {
                entity: Entity::Variation,
                id: 1
            }]
        );
    }

    #[test]
    fn column_problems() {
        let mut records = valid();
        records.columns[1].order = 0;
        records
            .columns
            .push(ColumnRecord::new(3, 42, "orphan", 0, ColumnType::Int));

        let errors = verify_records(&records).errors;
        assert!(errors.contains(&CalibError::DanglingParent {
            entity: Entity::Column,
            id: 3,
            parent_id: 42
        }));
        assert!(errors.contains(&CalibError::DuplicateColumnOrder {
            table_id: TypeTableId::new(1),
            order: 0
        }));
    }

    #[test]
    fn column_count_mismatch() {
        let mut records = valid();
        records.columns.pop();
        records.constant_sets[0].vault = "1|2".into();
        let errors = verify_records(&records).errors;
        assert_eq!(
            errors,
            vec![CalibError::ColumnCountMismatch {
                table_id: TypeTableId::new(1),
                declared: 2,
                actual: 1
            }]
        );
    }

    #[test]
    fn duplicate_ids_reported_once() {
        let mut records = valid();
        records.run_ranges.push(RunRangeRecord::new(1, "again", 0, 1));
        records.run_ranges.push(RunRangeRecord::new(1, "thrice", 0, 1));
        let errors = verify_records(&records).errors;
        assert_eq!(
            errors,
            vec![CalibError::DuplicateId {
                entity: Entity::RunRange,
                id: 1
            }]
        );
    }

    #[test]
    fn dangling_assignment_references() {
        let mut records = valid();
        records.assignments = vec![assignment(1, 5, 6, 7)];
        let errors = verify_records(&records).errors;
        assert_eq!(
            errors,
            vec![
                CalibError::DanglingParent {
                    entity: Entity::Assignment,
                    id: 1,
                    parent_id: 5
                },
                CalibError::DanglingParent {
                    entity: Entity::Assignment,
                    id: 1,
                    parent_id: 6
                },
                CalibError::DanglingParent {
                    entity: Entity::Assignment,
                    id: 1,
                    parent_id: 7
                },
            ]
        );
    }
}
