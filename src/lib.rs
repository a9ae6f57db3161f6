//! `jointfit` library crate.
//!
//! The binary (`jf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitters and models can be driven from other Rust code
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod cosmology;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod units;
