//! core
//!
//! Core domain types, schemas, and pure algorithms for calibdb.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ids, RecordName, UtcTimestamp, Fingerprint, Page
//! - [`error`] - Error taxonomy shared by every component
//! - [`codec`] - Blob codec: encode/decode/reshape/flatten
//! - [`graph`] - Parent-pointer forest shared by directories and variations
//! - [`records`] - Plain records mirroring the backing store schema
//! - [`catalog`] - Directory / type-table / column hierarchy
//! - [`variation`] - Variation inheritance chains
//! - [`runrange`] - Run range containment index
//! - [`verify`] - Whole record-set invariant verification
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Derived structure is built once, explicitly, after loading
//! - All algorithms are deterministic and side-effect free

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod records;
pub mod runrange;
pub mod types;
pub mod variation;
pub mod verify;
