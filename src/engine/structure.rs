//! engine::structure
//!
//! The derived, read-only structure resolution runs against: the schema
//! catalog, the variation graph and the run-range index, plus a fingerprint
//! of the records they were built from.
//!
//! A `Structure` is built once per record set and never edited. A rebuild
//! produces a new value which the [`ConstantsDb`](super::ConstantsDb) swaps
//! in whole.

use crate::core::catalog::Catalog;
use crate::core::error::CalibResult;
use crate::core::records::RecordSet;
use crate::core::runrange::RunRangeIndex;
use crate::core::types::Fingerprint;
use crate::core::variation::VariationGraph;

/// Catalog, variations and run ranges built from one record set.
#[derive(Debug, Clone)]
pub struct Structure {
    pub catalog: Catalog,
    pub variations: VariationGraph,
    pub run_ranges: RunRangeIndex,
    pub fingerprint: Fingerprint,
}

impl Structure {
    /// Build every index from `records`.
    ///
    /// Constant sets and assignments are ignored; they belong to the store.
    ///
    /// # Errors
    ///
    /// Whatever the catalog, variation graph or run-range index report.
    pub fn build(records: &RecordSet, strict_names: bool) -> CalibResult<Structure> {
        let catalog = Catalog::build(
            &records.directories,
            &records.type_tables,
            &records.columns,
            strict_names,
        )?;
        let variations = VariationGraph::build(&records.variations, strict_names)?;
        let run_ranges = RunRangeIndex::build(&records.run_ranges)?;

        Ok(Structure {
            catalog,
            variations,
            run_ranges,
            fingerprint: fingerprint(records),
        })
    }
}

/// Fingerprint of the structural records in `records`.
///
/// Order-independent: records are keyed by kind and id before hashing.
/// Assignments and constant sets do not contribute.
pub fn fingerprint(records: &RecordSet) -> Fingerprint {
    let mut entries: Vec<(String, String)> = Vec::new();
    entries.extend(
        records
            .directories
            .iter()
            .map(|r| (format!("directory:{}", r.id), format!("{r:?}"))),
    );
    entries.extend(
        records
            .type_tables
            .iter()
            .map(|r| (format!("type_table:{}", r.id), format!("{r:?}"))),
    );
    entries.extend(
        records
            .columns
            .iter()
            .map(|r| (format!("column:{}", r.id), format!("{r:?}"))),
    );
    entries.extend(
        records
            .variations
            .iter()
            .map(|r| (format!("variation:{}", r.id), format!("{r:?}"))),
    );
    entries.extend(
        records
            .run_ranges
            .iter()
            .map(|r| (format!("run_range:{}", r.id), format!("{r:?}"))),
    );
    Fingerprint::compute(&entries)
}
