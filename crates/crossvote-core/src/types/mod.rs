//! Core domain types.

pub mod categories;
pub mod precinct;

pub use categories::CategorySet;
pub use precinct::{Precinct, PrecinctSet};
