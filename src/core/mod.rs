//! Core building blocks for bound-constrained optimization
//!
//! This module contains the problem-side components the solvers operate on:
//! - Criterion trait implemented by external evaluators
//! - Box (bound) constraints with projection and active-set bookkeeping
//! - Trust-region state: iterate/gradient history and derived measures
//! - Scalar vector reductions shared by the measures

pub mod bounds;
pub mod criterion;
pub mod state;
pub mod vector;

pub use bounds::BoundConstraints;
pub use criterion::Criterion;
pub use state::TrustRegionState;

use thiserror::Error;
use tracing::error;

/// Core module error types for criterion evaluation and state construction
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Criterion evaluation failed (value, gradient, or Hessian product)
    #[error("Criterion evaluation failed: {0}")]
    Criterion(String),

    /// Invalid bound constraint specification
    #[error("Invalid bounds: {0}")]
    Bounds(String),

    /// Trust-region state construction or update error
    #[error("State error: {0}")]
    State(String),

    /// Dimension mismatch between control, gradient, or bound vectors
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// This method allows for a consistent error logging pattern throughout
    /// the core module, ensuring all errors are properly recorded.
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| CoreError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the source error from a third-party library
    ///
    /// # Arguments
    /// * `source_error` - The original error from the third-party library (must implement Debug)
    ///
    /// # Example
    /// ```ignore
    /// evaluator()
    ///     .map_err(|e| {
    ///         CoreError::Criterion("objective evaluation failed".to_string())
    ///             .log_with_source(e)
    ///     })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
