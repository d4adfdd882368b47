//! engine::perf
//!
//! Per-query performance log.
//!
//! # Format
//!
//! One line per resolve:
//!
//! ```text
//! CCDB_PERF_LOG: {"descr":"resolve 1000:default => /CDC/gains","elapsed":250,...}
//! ```
//!
//! Fields are `descr`, `elapsed` (in `t_units`), `t_units`, `thread_id` and
//! `start_stamp` (microseconds since the Unix epoch). Lines whose text
//! contains `" total"` are aggregate summaries; per-query readers skip them.
//!
//! Analysis of the log is left to external tools. This module only emits
//! lines and parses them back for tests and ad-hoc tooling.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix of every performance line.
pub const PERF_PREFIX: &str = "CCDB_PERF_LOG:";

/// Tracing target performance lines are logged under.
pub const PERF_TARGET: &str = "calibdb::perf";

/// Unit for the `elapsed` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeUnit {
    #[default]
    Micros,
    Millis,
    Secs,
}

impl TimeUnit {
    /// Parse a configured unit (`us`, `ms` or `s`).
    pub fn parse(s: &str) -> Option<TimeUnit> {
        match s {
            "us" => Some(TimeUnit::Micros),
            "ms" => Some(TimeUnit::Millis),
            "s" => Some(TimeUnit::Secs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Micros => "us",
            TimeUnit::Millis => "ms",
            TimeUnit::Secs => "s",
        }
    }

    /// Express `elapsed` in this unit, truncating.
    pub fn convert(&self, elapsed: Duration) -> u64 {
        let raw = match self {
            TimeUnit::Micros => elapsed.as_micros(),
            TimeUnit::Millis => elapsed.as_millis(),
            TimeUnit::Secs => u128::from(elapsed.as_secs()),
        };
        u64::try_from(raw).unwrap_or(u64::MAX)
    }
}

/// One performance log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfRecord {
    pub descr: String,
    pub elapsed: u64,
    pub t_units: String,
    pub thread_id: String,
    pub start_stamp: i64,
}

impl PerfRecord {
    /// Entry for a single resolve.
    pub fn resolve(
        run: i64,
        variation: &str,
        path: &str,
        elapsed: Duration,
        unit: TimeUnit,
        start_stamp: i64,
    ) -> Self {
        Self {
            descr: format!("resolve {run}:{variation} => {path}"),
            elapsed: unit.convert(elapsed),
            t_units: unit.as_str().to_string(),
            thread_id: current_thread_id(),
            start_stamp,
        }
    }

    /// Aggregate entry over `count` resolves.
    pub fn total(count: u64, elapsed: Duration, unit: TimeUnit, start_stamp: i64) -> Self {
        Self {
            descr: format!("resolve total ({count} queries)"),
            elapsed: unit.convert(elapsed),
            t_units: unit.as_str().to_string(),
            thread_id: current_thread_id(),
            start_stamp,
        }
    }

    /// Whether this is an aggregate summary.
    pub fn is_total(&self) -> bool {
        self.descr.contains(" total")
    }

    /// The table path after `=>` in `descr`.
    pub fn path(&self) -> Option<&str> {
        self.descr.split_once("=>").map(|(_, path)| path.trim())
    }

    /// Render as a log line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{PERF_PREFIX} {}", serde_json::to_string(self)?))
    }

    /// Parse a per-query log line.
    ///
    /// Returns `Ok(None)` for lines without the prefix and for summaries.
    pub fn from_line(line: &str) -> Result<Option<PerfRecord>, serde_json::Error> {
        let Some(body) = line.strip_prefix(PERF_PREFIX) else {
            return Ok(None);
        };
        if line.contains(" total") {
            return Ok(None);
        }
        serde_json::from_str(body.trim()).map(Some)
    }
}

fn current_thread_id() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Destination for performance records.
pub trait PerfSink: Send + Sync + std::fmt::Debug {
    fn emit(&self, record: &PerfRecord);
}

/// Logs each record through `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPerfSink;

impl PerfSink for TracingPerfSink {
    fn emit(&self, record: &PerfRecord) {
        match record.to_line() {
            Ok(line) => tracing::info!(target: PERF_TARGET, "{line}"),
            Err(e) => tracing::warn!(target: PERF_TARGET, error = %e, "failed to render perf record"),
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryPerfSink {
    records: Mutex<Vec<PerfRecord>>,
}

impl MemoryPerfSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn records(&self) -> Vec<PerfRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Everything emitted so far, rendered as log lines.
    pub fn lines(&self) -> Vec<String> {
        self.records()
            .iter()
            .filter_map(|r| r.to_line().ok())
            .collect()
    }
}

impl PerfSink for MemoryPerfSink {
    fn emit(&self, record: &PerfRecord) {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PerfRecord {
        PerfRecord {
            descr: "resolve 1000:default => /CDC/gains".into(),
            elapsed: 250,
            t_units: "us".into(),
            thread_id: "main".into(),
            start_stamp: 1_700_000_000_000_000,
        }
    }

    #[test]
    fn line_format() {
        insta::assert_snapshot!(
            sample().to_line().unwrap(),
            @r#"CCDB_PERF_LOG: {"descr":"resolve 1000:default => /CDC/gains","elapsed":250,"t_units":"us","thread_id":"main","start_stamp":1700000000000000}"#
        );
    }

    #[test]
    fn line_parses_back() {
        let line = sample().to_line().unwrap();
        let parsed = PerfRecord::from_line(&line).unwrap().unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(parsed.path(), Some("/CDC/gains"));
    }

    #[test]
    fn totals_and_foreign_lines_skipped() {
        let total = PerfRecord::total(3, Duration::from_micros(900), TimeUnit::Micros, 0);
        assert!(total.is_total());
        assert!(PerfRecord::from_line(&total.to_line().unwrap())
            .unwrap()
            .is_none());
        assert!(PerfRecord::from_line("INFO something else").unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(PerfRecord::from_line("CCDB_PERF_LOG: {not json").is_err());
    }

    #[test]
    fn resolve_descr_shape() {
        let record = PerfRecord::resolve(
            42,
            "mc",
            "/a/b",
            Duration::from_millis(3),
            TimeUnit::Millis,
            7,
        );
        assert_eq!(record.descr, "resolve 42:mc => /a/b");
        assert_eq!(record.elapsed, 3);
        assert_eq!(record.t_units, "ms");
        assert!(!record.is_total());
    }

    #[test]
    fn unit_conversion() {
        let d = Duration::from_micros(2_500_000);
        assert_eq!(TimeUnit::Micros.convert(d), 2_500_000);
        assert_eq!(TimeUnit::Millis.convert(d), 2_500);
        assert_eq!(TimeUnit::Secs.convert(d), 2);
        assert_eq!(TimeUnit::parse("ms"), Some(TimeUnit::Millis));
        assert_eq!(TimeUnit::parse("ns"), None);
    }

    #[test]
    fn memory_sink_collects() {
        let sink = MemoryPerfSink::new();
        sink.emit(&sample());
        assert_eq!(sink.records(), vec![sample()]);
        assert!(sink.lines()[0].starts_with(PERF_PREFIX));
    }
}
