//! One-dimensional models.
//!
//! `Model1D` is the interface the fitters work against; `BuiltinModel` covers the
//! stock kinds whose math lives in `builtin` as small, pure functions.

pub mod builtin;
pub mod model;

pub use model::*;
