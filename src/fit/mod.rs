//! Fitting.
//!
//! Responsibilities:
//!
//! - Levenberg–Marquardt nonlinear least squares (`levmar`)
//! - joint fits with shared parameters across models (`joint`)
//! - single-model fits, run in parallel for comparisons (`single`)

pub mod joint;
pub mod levmar;
pub mod single;

pub use joint::*;
pub use levmar::*;
pub use single::*;
