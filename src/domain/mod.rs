//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model kinds and named parameters (`ModelKind`, `Parameter`)
//! - datasets and solver settings
//! - job files (input) and result files (output)

pub mod types;

pub use types::*;
