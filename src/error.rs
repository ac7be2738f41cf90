//! Error types for the summit-solver library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.
//!
//! # Error Hierarchy
//!
//! The library uses a hierarchical error system where:
//! - **`SummitSolverError`** is the top-level error exposed to users via public APIs
//! - **Module errors** (`CoreError`, `OptimizerError`) are wrapped inside SummitSolverError
//! - **Error sources** are preserved, allowing full error chain inspection
//!
//! Example error chain:
//! ```text
//! SummitSolverError::Optimizer(
//!     OptimizerError::Core(
//!         CoreError::DimensionMismatch("control has 3 entries, bounds expect 4")
//!     )
//! )
//! ```

use crate::{core::CoreError, optimizer::OptimizerError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the summit-solver library
pub type SummitSolverResult<T> = Result<T, SummitSolverError>;

/// Main error type for the summit-solver library
///
/// This is the top-level error type exposed by public APIs. It wraps module-specific
/// errors while preserving the full error chain for debugging.
///
/// # Error Chain Access
///
/// You can access the full error chain using the `chain()` method:
///
/// ```rust,ignore
/// if let Err(e) = solver.optimize(&mut criterion, &mut state) {
///     warn!("Error: {}", e);
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum SummitSolverError {
    /// Core module errors (criterion evaluation, bounds, state)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
}

// Module-specific errors are automatically converted via #[from] attributes above
// No manual From implementations needed - thiserror handles it!

impl SummitSolverError {
    /// Get the full error chain as a string for logging and debugging.
    ///
    /// This method traverses the error source chain and returns a formatted string
    /// showing the hierarchy of errors from the top-level SummitSolverError down to
    /// the root cause.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// match solver.optimize(&mut criterion, &mut state) {
    ///     Ok(result) => { /* ... */ }
    ///     Err(e) => {
    ///         warn!("Optimization failed!");
    ///         warn!("Error chain: {}", e.chain());
    ///         // Output: "Criterion evaluation failed: objective returned NaN →
    ///         //          simulation backend unavailable"
    ///     }
    /// }
    /// ```
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain for logging
    ///
    /// Similar to `chain()` but formats as a single line with arrow separators.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// error!("Operation failed: {}", summit_err.chain_compact());
    /// // Output: "Core error: Invalid bounds: NaN bound at index 2 → Invalid bounds: NaN bound at index 2"
    /// ```
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summit_solver_error_display() {
        let core_error = CoreError::Bounds("lower bound exceeds upper bound".to_string());
        let error = SummitSolverError::from(core_error);
        assert!(error.to_string().contains("lower bound exceeds upper bound"));
    }

    #[test]
    fn test_summit_solver_error_chain() {
        let optimizer_error =
            OptimizerError::InvalidParameters("trust_region_expansion must exceed 1".to_string());
        let error = SummitSolverError::from(optimizer_error);

        let chain = error.chain();
        assert!(chain.contains("Invalid optimization parameters"));
        assert!(chain.contains("trust_region_expansion"));
    }

    #[test]
    fn test_summit_solver_error_chain_compact() {
        let core_error = CoreError::Criterion("objective returned NaN".to_string());
        let error = SummitSolverError::from(core_error);

        let chain_compact = error.chain_compact();
        assert!(chain_compact.contains("objective returned NaN"));
    }

    #[test]
    fn test_summit_solver_result_ok() {
        let result: SummitSolverResult<i32> = Ok(42);
        assert!(result.is_ok());
        if let Ok(value) = result {
            assert_eq!(value, 42);
        }
    }

    #[test]
    fn test_summit_solver_result_err() {
        let core_error = CoreError::State("gradient set before control".to_string());
        let result: SummitSolverResult<i32> = Err(SummitSolverError::from(core_error));
        assert!(result.is_err());
    }

    #[test]
    fn test_transparent_error_conversion() {
        // Test automatic conversion via #[from]
        let optimizer_error = OptimizerError::HessianUnavailable;

        let summit_error: SummitSolverError = optimizer_error.into();
        match summit_error {
            SummitSolverError::Optimizer(_) => { /* Expected */ }
            _ => panic!("Expected Optimizer variant"),
        }
    }

    #[test]
    fn test_nested_core_error_through_optimizer() {
        let core_error = CoreError::DimensionMismatch(
            "control has 3 entries, bounds expect 4".to_string(),
        );
        let optimizer_error = OptimizerError::from(core_error);
        let error = SummitSolverError::from(optimizer_error);

        let chain_compact = error.chain_compact();
        assert!(chain_compact.contains("Dimension mismatch"));
    }
}
