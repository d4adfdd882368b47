//! engine
//!
//! The resolution engine and the [`ConstantsDb`] handle.
//!
//! # Architecture
//!
//! ```text
//! RecordSet --build--> Structure (catalog, variations, run ranges)
//!           --load---> AssignmentStore
//!
//! Query --resolve(Structure snapshot, store)--> ResolvedTable
//! ```
//!
//! `ConstantsDb` owns the current [`Structure`] behind `RwLock<Arc<_>>`. A
//! resolve clones the `Arc` and works on that snapshot without holding the
//! lock, so a structural reload swaps everything at once and never exposes a
//! half-built catalog. Appends go through the store, which is atomic on its
//! own.
//!
//! # Invariants
//!
//! - Resolution never mutates the structure or the store
//! - A reload with an unchanged structural fingerprint is skipped
//! - An append is validated against the structure before it touches the store
//!
//! # Example
//!
//! ```
//! use calibdb::core::codec::{ColumnType, Nested};
//! use calibdb::core::config::Config;
//! use calibdb::core::records::*;
//! use calibdb::core::types::RunRangeId;
//! use calibdb::engine::{AppendRequest, ConstantsDb, Query};
//!
//! let records = RecordSet {
//!     directories: vec![DirectoryRecord::new(1, "CDC", None)],
//!     type_tables: vec![TypeTableRecord::new(1, "gains", 1, 1, 2)],
//!     columns: vec![
//!         ColumnRecord::new(1, 1, "x", 0, ColumnType::Double),
//!         ColumnRecord::new(2, 1, "y", 1, ColumnType::Double),
//!     ],
//!     run_ranges: vec![RunRangeRecord::new(1, "all", 0, 100_000)],
//!     variations: vec![VariationRecord::new(1, "default", None)],
//!     ..Default::default()
//! };
//! let db = ConstantsDb::from_records(&records, Config::default()).unwrap();
//!
//! db.append(AppendRequest::new("/CDC/gains", RunRangeId::new(1), "default", vec![
//!     Nested::list([1.0, 2.0]),
//! ])).unwrap();
//!
//! let table = db.resolve(&Query::new("/CDC/gains", 30_000)).unwrap();
//! assert_eq!(table.rows, vec![vec!["1.0".to_string(), "2.0".to_string()]]);
//! ```

pub mod history;
pub mod perf;
pub mod resolve;
pub mod structure;

pub use history::HistoryFilter;
pub use perf::{MemoryPerfSink, PerfRecord, PerfSink, TimeUnit, TracingPerfSink};
pub use resolve::{select, ResolvedTable};
pub use structure::Structure;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::core::codec::{encode, flatten, Nested, Scalar};
use crate::core::config::Config;
use crate::core::error::{CalibError, CalibResult, Entity};
use crate::core::records::RecordSet;
use crate::core::types::{AssignmentId, RunRangeId, UtcTimestamp};
use crate::store::{Assignment, AssignmentStore, NewAssignment};

/// A resolution request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Full table path, e.g. `/CDC/gains`
    pub path: String,
    pub run: i64,
    /// `None` uses the configured default variation
    pub variation: Option<String>,
    /// `None` applies no time cutoff
    pub as_of: Option<UtcTimestamp>,
}

impl Query {
    pub fn new(path: impl Into<String>, run: i64) -> Self {
        Self {
            path: path.into(),
            run,
            variation: None,
            as_of: None,
        }
    }

    pub fn with_variation(mut self, name: impl Into<String>) -> Self {
        self.variation = Some(name.into());
        self
    }

    pub fn with_as_of(mut self, as_of: UtcTimestamp) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

/// New constants to append for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRequest {
    pub path: String,
    pub run_range: RunRangeId,
    pub variation: String,
    /// `None` stamps the append with the current time
    pub created: Option<UtcTimestamp>,
    /// Row-major values; nesting is flattened before encoding
    pub values: Vec<Nested<Scalar>>,
}

impl AppendRequest {
    pub fn new(
        path: impl Into<String>,
        run_range: RunRangeId,
        variation: impl Into<String>,
        values: Vec<Nested<Scalar>>,
    ) -> Self {
        Self {
            path: path.into(),
            run_range,
            variation: variation.into(),
            created: None,
            values,
        }
    }

    pub fn created_at(mut self, created: UtcTimestamp) -> Self {
        self.created = Some(created);
        self
    }
}

#[derive(Debug, Default)]
struct PerfTotals {
    count: AtomicU64,
    micros: AtomicU64,
}

/// Handle over one loaded record set.
#[derive(Debug)]
pub struct ConstantsDb {
    structure: RwLock<Arc<Structure>>,
    store: AssignmentStore,
    config: Config,
    perf: Option<Arc<dyn PerfSink>>,
    perf_unit: TimeUnit,
    totals: PerfTotals,
}

impl ConstantsDb {
    /// Build the structure and load the store from `records`.
    ///
    /// With `[perf] enabled`, resolves are logged through [`TracingPerfSink`].
    ///
    /// # Errors
    ///
    /// Any structural error from building the indexes, plus `DanglingParent`
    /// or `DuplicateOwner` from the store.
    pub fn from_records(records: &RecordSet, config: Config) -> CalibResult<ConstantsDb> {
        let structure = Structure::build(records, config.strict_names())?;
        let store = AssignmentStore::from_records(&records.constant_sets, &records.assignments)?;

        tracing::info!(
            tables = structure.catalog.tables().count(),
            variations = structure.variations.iter().count(),
            run_ranges = structure.run_ranges.len(),
            assignments = store.len(),
            fingerprint = %structure.fingerprint,
            "loaded constants"
        );

        let perf: Option<Arc<dyn PerfSink>> = if config.perf_enabled() {
            Some(Arc::new(TracingPerfSink))
        } else {
            None
        };
        let perf_unit = TimeUnit::parse(config.perf_time_units()).unwrap_or_default();

        Ok(ConstantsDb {
            structure: RwLock::new(Arc::new(structure)),
            store,
            config,
            perf,
            perf_unit,
            totals: PerfTotals::default(),
        })
    }

    /// Route performance records to `sink`, enabling the log.
    pub fn with_perf_sink(mut self, sink: Arc<dyn PerfSink>) -> Self {
        self.perf = Some(sink);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current structure snapshot.
    pub fn structure(&self) -> Arc<Structure> {
        Arc::clone(&self.structure.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    /// Resolve a query to exactly one table of values.
    ///
    /// # Errors
    ///
    /// See [`resolve::resolve`].
    pub fn resolve(&self, query: &Query) -> CalibResult<ResolvedTable> {
        let variation = query
            .variation
            .as_deref()
            .unwrap_or_else(|| self.config.default_variation());

        let Some(sink) = &self.perf else {
            return resolve::resolve(
                &self.structure(),
                &self.store,
                &query.path,
                query.run,
                variation,
                query.as_of,
            );
        };

        let start_stamp = UtcTimestamp::now().as_datetime().timestamp_micros();
        let started = Instant::now();
        let result = resolve::resolve(
            &self.structure(),
            &self.store,
            &query.path,
            query.run,
            variation,
            query.as_of,
        );
        let elapsed = started.elapsed();

        self.totals.count.fetch_add(1, Ordering::Relaxed);
        self.totals.micros.fetch_add(
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        sink.emit(&PerfRecord::resolve(
            query.run,
            variation,
            &query.path,
            elapsed,
            self.perf_unit,
            start_stamp,
        ));

        result
    }

    /// Assignment history of the table at `path`.
    pub fn history(&self, path: &str, filter: &HistoryFilter) -> CalibResult<Vec<Assignment>> {
        history::history(&self.structure(), &self.store, path, filter)
    }

    /// Validate and append new constants.
    ///
    /// Values are flattened, checked against the table's column count and
    /// column types, encoded, then appended atomically.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown path, run range or variation
    /// - `ArityMismatch` if the values are empty or do not form whole rows
    /// - `InvalidCell` if a value does not fit its column type
    pub fn append(&self, request: AppendRequest) -> CalibResult<AssignmentId> {
        let structure = self.structure();
        let table = structure.catalog.table_by_path(&request.path)?;
        let run_range = structure
            .run_ranges
            .get(request.run_range)
            .ok_or_else(|| CalibError::not_found(Entity::RunRange, request.run_range.to_string()))?;
        let variation = structure.variations.by_name(&request.variation)?;

        let flat = flatten(&request.values);
        let columns = table.columns();
        if flat.is_empty() || columns.is_empty() || flat.len() % columns.len() != 0 {
            return Err(CalibError::ArityMismatch {
                cells: flat.len(),
                columns: columns.len(),
                constant_set_id: None,
            });
        }
        for (value, column) in flat.iter().zip(columns.iter().cycle()) {
            column
                .column_type
                .parse_cell(&column.name, &value.to_string())?;
        }

        Ok(self.store.append(NewAssignment {
            type_table_id: table.id,
            run_range_id: run_range.id,
            variation_id: variation.id,
            created: request.created.unwrap_or_else(UtcTimestamp::now),
            vault: encode(&flat),
        }))
    }

    /// Rebuild the structure from `records` and swap it in.
    ///
    /// Returns `false` without rebuilding when the structural fingerprint is
    /// unchanged. Assignments in `records` are ignored; the store keeps its
    /// own log.
    ///
    /// # Errors
    ///
    /// Any structural error from building the indexes. The current structure
    /// stays in place on failure.
    pub fn reload_structure(&self, records: &RecordSet) -> CalibResult<bool> {
        let current = self.structure();
        if structure::fingerprint(records) == current.fingerprint {
            tracing::warn!(fingerprint = %current.fingerprint, "structure unchanged, skipping rebuild");
            return Ok(false);
        }

        let rebuilt = Arc::new(Structure::build(records, self.config.strict_names())?);
        tracing::info!(
            from = %current.fingerprint,
            to = %rebuilt.fingerprint,
            "rebuilt structure"
        );
        *self
            .structure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = rebuilt;
        Ok(true)
    }

    /// Emit a `resolve total` summary of every timed resolve so far.
    ///
    /// Does nothing when the performance log is disabled.
    pub fn emit_perf_total(&self) {
        let Some(sink) = &self.perf else {
            return;
        };
        let count = self.totals.count.load(Ordering::Relaxed);
        let elapsed = Duration::from_micros(self.totals.micros.load(Ordering::Relaxed));
        let stamp = UtcTimestamp::now().as_datetime().timestamp_micros();
        sink.emit(&PerfRecord::total(count, elapsed, self.perf_unit, stamp));
    }
}
