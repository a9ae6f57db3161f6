//! Units and equivalencies needed by the CLI's `convert` command.

pub mod equivalency;

pub use equivalency::*;
