//! engine::resolve
//!
//! Pick exactly one assignment for a `(path, run, variation, as_of)` query.
//!
//! # Algorithm
//!
//! 1. Resolve the path to a type table
//! 2. Collect the run ranges containing the run; none means `NotFound`
//! 3. Compute the variation's priority chain
//! 4. Gather the table's assignments in those ranges created at or before
//!    `as_of`
//! 5. Keep the ones whose variation sits earliest in the chain; among those
//!    take the latest `created`, then the highest id
//! 6. Decode and reshape the winner's blob
//!
//! A child variation's older assignment always beats a newer one on an
//! ancestor. Recency only decides between assignments of equal specificity.

use std::collections::BTreeMap;

use crate::core::catalog::Column;
use crate::core::codec::{decode, map_rows, reshape, Scalar};
use crate::core::error::{CalibError, CalibResult, Entity};
use crate::core::runrange::RunRange;
use crate::core::types::{UtcTimestamp, VariationId};
use crate::store::{Assignment, AssignmentStore};

use super::structure::Structure;

/// The table selected by a resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    /// The winning assignment
    pub assignment: Assignment,
    pub table_path: String,
    pub run_range: RunRange,
    /// Name of the variation the winning assignment belongs to
    pub variation: String,
    /// Columns sorted by `order`
    pub columns: Vec<Column>,
    /// Row-major decoded cells
    pub rows: Vec<Vec<String>>,
}

impl ResolvedTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rows keyed by column name.
    pub fn mapped_rows(&self) -> Vec<BTreeMap<String, String>> {
        map_rows(&self.rows, &self.column_names())
    }

    /// Rows parsed by column type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCell` for the first cell that does not parse.
    pub fn typed_rows(&self) -> CalibResult<Vec<Vec<Scalar>>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.columns)
                    .map(|(cell, column)| column.column_type.parse_cell(&column.name, cell))
                    .collect()
            })
            .collect()
    }

    /// The single cell at `(row, column)`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

/// Choose the winner among `candidates` under `chain` priority.
///
/// Candidates whose variation is not in the chain are ignored. Returns
/// `None` if nothing remains.
pub fn select<'a>(chain: &[VariationId], candidates: &'a [Assignment]) -> Option<&'a Assignment> {
    let rank = |a: &Assignment| chain.iter().position(|v| *v == a.variation_id);

    candidates
        .iter()
        .filter_map(|a| rank(a).map(|r| (r, a)))
        .min_by(|(ra, a), (rb, b)| {
            ra.cmp(rb)
                .then_with(|| b.created.cmp(&a.created))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|(_, a)| a)
}

/// Resolve one query against a structure snapshot and the store.
///
/// # Errors
///
/// - `NotFound` for an unknown path or variation, a run outside every range,
///   or no surviving assignment
/// - `CycleDetected` / `DanglingParent` from the variation chain
/// - `ArityMismatch` if the stored blob does not fit the table
pub fn resolve(
    structure: &Structure,
    store: &AssignmentStore,
    path: &str,
    run: i64,
    variation: &str,
    as_of: Option<UtcTimestamp>,
) -> CalibResult<ResolvedTable> {
    let table = structure.catalog.table_by_path(path)?;

    let ranges = structure.run_ranges.containing(run);
    if ranges.is_empty() {
        return Err(CalibError::not_found(
            Entity::RunRange,
            format!("no run range covers run {run}"),
        ));
    }

    let chain = structure.variations.priority_chain(variation)?;
    let candidates = store.candidates(table.id, &ranges, as_of);
    tracing::debug!(
        path,
        run,
        variation,
        ranges = ranges.len(),
        chain = chain.len(),
        candidates = candidates.len(),
        "gathered candidates"
    );

    let winner = select(&chain, &candidates).ok_or_else(|| {
        CalibError::not_found(
            Entity::Assignment,
            format!("{path} for run {run} under '{variation}'"),
        )
    })?;
    tracing::debug!(assignment = %winner.id, created = %winner.created, "selected assignment");

    let set = store
        .constant_set(winner.constant_set_id)
        .ok_or_else(|| CalibError::not_found(Entity::ConstantSet, winner.constant_set_id.to_string()))?;
    let rows = reshape(&decode(&set.vault), table.column_count)
        .map_err(|err| err.in_constant_set(set.id))?;

    let run_range = structure
        .run_ranges
        .get(winner.run_range_id)
        .cloned()
        .ok_or_else(|| CalibError::not_found(Entity::RunRange, winner.run_range_id.to_string()))?;
    let variation_name = structure
        .variations
        .get(winner.variation_id)
        .map(|v| v.name.clone())
        .ok_or_else(|| CalibError::not_found(Entity::Variation, winner.variation_id.to_string()))?;

    Ok(ResolvedTable {
        assignment: winner.clone(),
        table_path: table.path.clone(),
        run_range,
        variation: variation_name,
        columns: table.columns().to_vec(),
        rows,
    })
}
