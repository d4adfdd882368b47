//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - Id newtypes: [`DirectoryId`], [`TypeTableId`], [`ColumnId`],
//!   [`ConstantSetId`], [`AssignmentId`], [`RunRangeId`], [`VariationId`]
//! - [`RecordName`] - Validated name for directories, tables, columns, variations
//! - [`UtcTimestamp`] - Creation / cutoff timestamp
//! - [`Fingerprint`] - Structural state hash for cache invalidation
//! - [`Page`] - `take` / `start_with` window for listings
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use calibdb::core::types::{RecordName, VariationId};
//!
//! let name = RecordName::new("fadc_gains").unwrap();
//! assert_eq!(name.as_str(), "fadc_gains");
//!
//! assert!(RecordName::new("bad/name").is_err());
//! assert_eq!(VariationId::new(7).get(), 7);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw database key.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Key of a row in `directories`.
    DirectoryId
);
record_id!(
    /// Key of a row in `type_tables`.
    TypeTableId
);
record_id!(
    /// Key of a row in `columns`.
    ColumnId
);
record_id!(
    /// Key of a row in `constant_sets`.
    ConstantSetId
);
record_id!(
    /// Key of a row in `assignments`.
    AssignmentId
);
record_id!(
    /// Key of a row in `run_ranges`.
    RunRangeId
);
record_id!(
    /// Key of a row in `variations`.
    VariationId
);

/// A validated name for a directory, type table, column or variation.
///
/// Names must:
/// - Be non-empty and at most 255 bytes
/// - Contain only ASCII letters, digits, `_` and `-`
///
/// The `/` separator in particular is rejected, so a name can always be
/// joined into a path without ambiguity.
///
/// # Example
///
/// ```
/// use calibdb::core::types::RecordName;
///
/// assert!(RecordName::new("default").is_ok());
/// assert!(RecordName::new("run-2024_b").is_ok());
///
/// assert!(RecordName::new("").is_err());
/// assert!(RecordName::new("has space").is_err());
/// assert!(RecordName::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordName(String);

impl RecordName {
    /// Longest accepted name, matching the backing `VARCHAR(255)` columns.
    pub const MAX_LEN: usize = 255;

    /// Create a new validated name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidName` if the name contains characters
    /// outside `[A-Za-z0-9_-]`, is empty, or is too long.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Check a name without allocating a `RecordName`.
    pub fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidName("name cannot be empty".into()));
        }
        if name.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidName(format!(
                "name longer than {} bytes",
                Self::MAX_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(TypeError::InvalidName(format!(
                "name '{name}' cannot contain '{}'",
                c.escape_default()
            )));
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordName> for String {
    fn from(name: RecordName) -> Self {
        name.0
    }
}

impl AsRef<str> for RecordName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp.
///
/// Ordered, so it can serve both as an assignment's `created` time and as a
/// resolution cutoff.
///
/// # Example
///
/// ```
/// use calibdb::core::types::UtcTimestamp;
///
/// let earlier = UtcTimestamp::from_unix(1_000).unwrap();
/// let later = UtcTimestamp::from_unix(2_000).unwrap();
/// assert!(earlier < later);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Create a timestamp from seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTimestamp` if the value is out of range.
    pub fn from_unix(secs: i64) -> Result<Self, TypeError> {
        chrono::DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| TypeError::InvalidTimestamp(format!("{secs} is out of range")))
    }

    /// Seconds since the Unix epoch.
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable hash over structural records.
///
/// Computed over `(key, value)` lines describing directories, tables,
/// columns, variations and run ranges. Two record sets with the same
/// structure produce the same fingerprint regardless of input order, so a
/// rebuild of the derived caches can be skipped when nothing changed.
///
/// # Example
///
/// ```
/// use calibdb::core::types::Fingerprint;
///
/// let a = Fingerprint::compute(&[("dir/1".into(), "a".into()), ("dir/2".into(), "b".into())]);
/// let b = Fingerprint::compute(&[("dir/2".into(), "b".into()), ("dir/1".into(), "a".into())]);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from `(key, value)` pairs.
    ///
    /// Pairs are sorted by key before hashing.
    pub fn compute(entries: &[(String, String)]) -> Self {
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        for (key, value) in sorted {
            hasher.update(key.as_bytes());
            hasher.update(b"\0");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paging window for listings.
///
/// `take == 0` selects everything after `start_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub take: usize,
    pub start_with: usize,
}

impl Page {
    /// Everything, unpaged.
    pub const ALL: Page = Page {
        take: 0,
        start_with: 0,
    };

    pub fn new(take: usize, start_with: usize) -> Self {
        Self { take, start_with }
    }

    /// Apply the window to an already ordered sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skipped = items.into_iter().skip(self.start_with);
        if self.take == 0 {
            skipped.collect()
        } else {
            skipped.take(self.take).collect()
        }
    }
}
