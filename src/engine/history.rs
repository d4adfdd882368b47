//! engine::history
//!
//! Assignment history listing for a table.
//!
//! Unlike resolution, history does not apply inheritance: a variation filter
//! matches that variation exactly.

use crate::core::error::CalibResult;
use crate::core::types::{Page, UtcTimestamp};
use crate::store::{Assignment, AssignmentStore};

use super::structure::Structure;

/// Filters and ordering for [`history`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    /// Only assignments whose run range contains this run
    pub run: Option<i64>,
    /// Only assignments whose run range covers all of `[min, max]`
    pub runs: Option<(i64, i64)>,
    /// Only assignments on the run range with this label
    pub run_range: Option<String>,
    /// Only assignments on exactly this variation
    pub variation: Option<String>,
    /// Created at or after
    pub begin: Option<UtcTimestamp>,
    /// Created at or before
    pub end: Option<UtcTimestamp>,
    /// Oldest first instead of newest first
    pub ascending: bool,
    pub page: Page,
}

impl HistoryFilter {
    pub fn run(mut self, run: i64) -> Self {
        self.run = Some(run);
        self
    }

    pub fn runs(mut self, min: i64, max: i64) -> Self {
        self.runs = Some((min, max));
        self
    }

    pub fn run_range(mut self, name: impl Into<String>) -> Self {
        self.run_range = Some(name.into());
        self
    }

    pub fn variation(mut self, name: impl Into<String>) -> Self {
        self.variation = Some(name.into());
        self
    }

    pub fn window(mut self, begin: Option<UtcTimestamp>, end: Option<UtcTimestamp>) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    pub fn ascending(mut self) -> Self {
        self.ascending = true;
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }
}

/// List the assignments of the table at `path`.
///
/// Sorted by `created`, ties by id, newest first unless `filter.ascending`.
///
/// # Errors
///
/// `NotFound` if the path, run-range label or variation does not exist.
pub fn history(
    structure: &Structure,
    store: &AssignmentStore,
    path: &str,
    filter: &HistoryFilter,
) -> CalibResult<Vec<Assignment>> {
    let table = structure.catalog.table_by_path(path)?;

    let ranges = filter.run.map(|run| structure.run_ranges.containing(run));
    let covers = |a: &Assignment| {
        filter.runs.map_or(true, |(min, max)| {
            structure
                .run_ranges
                .get(a.run_range_id)
                .is_some_and(|r| r.min <= min && max <= r.max)
        })
    };
    let range_id = filter
        .run_range
        .as_deref()
        .map(|name| structure.run_ranges.by_name(name).map(|r| r.id))
        .transpose()?;
    let variation_id = filter
        .variation
        .as_deref()
        .map(|name| structure.variations.by_name(name).map(|v| v.id))
        .transpose()?;

    let mut found: Vec<Assignment> = store
        .for_table(table.id)
        .into_iter()
        .filter(|a| ranges.as_ref().map_or(true, |r| r.contains(&a.run_range_id)))
        .filter(|a| covers(a))
        .filter(|a| range_id.map_or(true, |id| a.run_range_id == id))
        .filter(|a| variation_id.map_or(true, |id| a.variation_id == id))
        .filter(|a| filter.begin.map_or(true, |t| a.created >= t))
        .filter(|a| filter.end.map_or(true, |t| a.created <= t))
        .collect();

    found.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
    if !filter.ascending {
        found.reverse();
    }

    Ok(filter.page.apply(found))
}
