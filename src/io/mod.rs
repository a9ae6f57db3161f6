//! Input/output helpers.
//!
//! - dataset CSV ingest + validation (`ingest`)
//! - job file loading (`job`)
//! - result JSON and residual CSV exports (`export`)

pub mod export;
pub mod ingest;
pub mod job;

pub use export::*;
pub use ingest::*;
pub use job::*;
