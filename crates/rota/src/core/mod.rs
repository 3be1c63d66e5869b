//! Read path: queries, executor, and the pure transforms applied to its results.

pub mod executor;
pub mod queries;
pub mod stats;
pub mod transform;

pub use executor::QueryExecutor;
pub use stats::{aggregate, compute_stats};
pub use transform::transform_assignments;
