//! Cosmology descriptions: the `Cosmology` interface, flat and non-flat
//! Lambda-CDM, modified copies, equivalence and YAML/JSON files.

pub mod flrw;
pub mod io;

pub use self::flrw::*;
pub use self::io::*;
