//! Shared primitives for the subrecon workspace.
//!
//! - **Error types**: [`ReconError`] and [`Result`] for structured error handling
//! - **Traits**: [`Summarizable`] and [`Reportable`] for display of run inputs
//! - **Log-space numerics**: [`log_sum_exp`] and [`ln_values`]

pub mod error;
pub mod prob;
pub mod traits;

pub use error::{ReconError, Result};
pub use prob::{ln_values, log_sum_exp};
pub use traits::*;
