//! core::runrange
//!
//! Containment index over run ranges.
//!
//! A run range is the closed interval `[min, max]` of experiment run numbers.
//! Ranges may overlap; a run can fall into several of them. An empty result
//! from [`RunRangeIndex::containing`] is valid and simply means "no
//! candidate"; turning that into an error is the resolution engine's call.

use std::collections::{BTreeSet, HashMap};

use super::error::{CalibError, CalibResult, Entity};
use super::records::RunRangeRecord;
use super::types::RunRangeId;

/// A closed interval of runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRange {
    pub id: RunRangeId,
    /// Optional label; empty when unnamed
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl RunRange {
    /// Whether `run` lies within `[min, max]`.
    pub fn contains(&self, run: i64) -> bool {
        self.min <= run && run <= self.max
    }
}

impl std::fmt::Display for RunRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}-{}", self.min, self.max)
        } else {
            write!(f, "{}:{}-{}", self.name, self.min, self.max)
        }
    }
}

/// Run ranges sorted by lower bound.
#[derive(Debug, Clone, Default)]
pub struct RunRangeIndex {
    /// Sorted by `(min, id)`
    ranges: Vec<RunRange>,
    by_id: HashMap<RunRangeId, usize>,
}

impl RunRangeIndex {
    /// Index run range records.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRunRange` if any record has `min > max`.
    pub fn build(records: &[RunRangeRecord]) -> CalibResult<Self> {
        let mut ranges = Vec::with_capacity(records.len());
        for record in records {
            if record.min > record.max {
                return Err(CalibError::InvalidRunRange {
                    id: record.id.get(),
                    min: record.min,
                    max: record.max,
                });
            }
            ranges.push(RunRange {
                id: record.id,
                name: record.name.clone(),
                min: record.min,
                max: record.max,
            });
        }
        ranges.sort_by_key(|r| (r.min, r.id));

        let by_id = ranges.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Ok(Self { ranges, by_id })
    }

    /// Ids of every range with `min <= run <= max`.
    ///
    /// # Example
    ///
    /// ```
    /// use calibdb::core::records::RunRangeRecord;
    /// use calibdb::core::runrange::RunRangeIndex;
    ///
    /// let index = RunRangeIndex::build(&[
    ///     RunRangeRecord::new(1, "", 0, 100),
    ///     RunRangeRecord::new(2, "", 50, 60),
    /// ]).unwrap();
    ///
    /// assert_eq!(index.containing(55).len(), 2);
    /// assert_eq!(index.containing(10).len(), 1);
    /// assert!(index.containing(500).is_empty());
    /// ```
    pub fn containing(&self, run: i64) -> BTreeSet<RunRangeId> {
        self.ranges
            .iter()
            .take_while(|r| r.min <= run)
            .filter(|r| r.contains(run))
            .map(|r| r.id)
            .collect()
    }

    /// Look up a range by id.
    pub fn get(&self, id: RunRangeId) -> Option<&RunRange> {
        self.by_id.get(&id).map(|i| &self.ranges[*i])
    }

    /// Look up a range by its label.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no range carries this name. Unnamed ranges are
    /// never matched.
    pub fn by_name(&self, name: &str) -> CalibResult<&RunRange> {
        if name.is_empty() {
            return Err(CalibError::not_found(Entity::RunRange, name));
        }
        self.ranges
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| CalibError::not_found(Entity::RunRange, name))
    }

    /// All ranges, sorted by lower bound.
    pub fn iter(&self) -> impl Iterator<Item = &RunRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
