//! Data preparation: chunk-independent aggregation, contest tallies, and
//! the precinct filter that guards the model from degenerate input.

pub mod aggregate;
pub mod contest;
pub mod filter;

pub use aggregate::{Combine, KeyedAggregate};
pub use contest::{ContestSpec, ShareTable, VoteRecord};
pub use filter::{ExclusionReason, FilterReport, PrecinctFilter};
