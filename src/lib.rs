//! calibdb - A versioned calibration-constants store
//!
//! calibdb keeps a hierarchy of named tables whose data is not a single value
//! but an append-only history of **assignments**, each scoped to a run range,
//! a variation and a creation time. The crate answers one question
//! deterministically: "what is the value of table X for run N under
//! variation V as of time T?"
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Domain types, blob codec, schema catalog, variation graph,
//!   run-range index, verification and configuration
//! - [`store`] - Append-only assignment store
//! - [`engine`] - Resolution engine, `ConstantsDb` handle, performance log
//!
//! # Correctness Invariants
//!
//! calibdb maintains the following invariants:
//!
//! 1. Resolution never mutates its inputs
//! 2. Variation specificity beats recency; within equal specificity, recency wins
//! 3. Appends are atomic with respect to concurrent resolution
//! 4. Structural corruption (cycles, dangling parents) is reported, never papered over

pub mod core;
pub mod engine;
pub mod store;

pub use crate::core::error::{CalibError, Entity};
pub use crate::engine::{ConstantsDb, Query, ResolvedTable};
