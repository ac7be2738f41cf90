//! Trust-region solvers for bound-constrained and constrained minimization.
//!
//! This module provides the optimization algorithms built on the core state:
//! - Kelley-Sachs bound-constrained trust-region algorithm
//! - Steihaug-Toint truncated CG subproblem solver
//! - Augmented Lagrangian wrapper for general (in)equality constraints
//! - Hessian application strategies (analytic, limited-memory BFGS, disabled)

use crate::core::CoreError;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;
use web_time as time;

pub mod augmented_lagrangian;
pub mod hessian;
pub mod kelley_sachs;
pub mod steihaug_toint;

pub use augmented_lagrangian::{AugmentedLagrangian, Constraint, ConstraintKind};
pub use hessian::HessianMethod;
pub use kelley_sachs::KelleySachs;
pub use steihaug_toint::{CgStopReason, SteihaugTointSolver};

// Re-export observer types from the observers module
pub use crate::observers::{OptObserver, OptObserverVec};

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Criterion evaluation or state construction failed
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Invalid optimization parameters provided
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),

    /// The analytical Hessian method was selected but the criterion does not
    /// supply Hessian-vector products
    #[error(
        "Criterion does not supply Hessian-vector products; select the lbfgs or none Hessian method"
    )]
    HessianUnavailable,
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// This method allows for a consistent error logging pattern throughout
    /// the optimizer module, ensuring all errors are properly recorded.
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| OptimizerError::from(e).log())?;
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
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Detailed convergence information.
#[derive(Debug, Clone)]
pub struct ConvergenceInfo {
    /// Final stationarity measure
    pub final_stationarity: f64,
    /// Final control stagnation (max-abs step of the last accepted iterate)
    pub final_control_stagnation: f64,
    /// Criterion value evaluation count
    pub value_evaluations: usize,
    /// Criterion gradient evaluation count
    pub gradient_evaluations: usize,
    /// Maximum constraint violation (augmented Lagrangian runs only)
    pub constraint_violation: Option<f64>,
}

impl Display for ConvergenceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final stationarity: {:.2e}, Final control stagnation: {:.2e}, Value evaluations: {}, Gradient evaluations: {}",
            self.final_stationarity,
            self.final_control_stagnation,
            self.value_evaluations,
            self.gradient_evaluations
        )?;
        if let Some(violation) = self.constraint_violation {
            write!(f, ", Constraint violation: {violation:.2e}")?;
        }
        Ok(())
    }
}

/// Status of an optimization process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Optimization converged (stationarity and, where applicable,
    /// feasibility tolerances met)
    Converged,
    /// Stationarity measure fell below the gradient tolerance
    GradientToleranceReached,
    /// Stationarity and actual-reduction tolerances met together
    StationarityToleranceReached,
    /// Control stagnation fell below its tolerance
    ControlStagnationReached,
    /// Objective stagnation fell below its tolerance
    ObjectiveStagnationReached,
    /// Maximum number of iterations reached
    MaxIterationsReached,
    /// NaN or Inf detected in objective, gradient, or iterate
    InvalidNumericalValues,
    /// Other failure
    Failed(String),
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::GradientToleranceReached => {
                write!(f, "Gradient tolerance reached")
            }
            OptimizationStatus::StationarityToleranceReached => {
                write!(f, "Stationarity tolerance reached")
            }
            OptimizationStatus::ControlStagnationReached => {
                write!(f, "Control stagnation tolerance reached")
            }
            OptimizationStatus::ObjectiveStagnationReached => {
                write!(f, "Objective stagnation tolerance reached")
            }
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::InvalidNumericalValues => {
                write!(f, "Invalid numerical values (NaN/Inf) detected")
            }
            OptimizationStatus::Failed(msg) => write!(f, "Failed: {msg}"),
        }
    }
}

impl OptimizationStatus {
    /// True for every terminal status that delivered a usable iterate under a
    /// convergence tolerance (as opposed to hitting caps or numerical trouble).
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Converged
                | OptimizationStatus::GradientToleranceReached
                | OptimizationStatus::StationarityToleranceReached
                | OptimizationStatus::ControlStagnationReached
                | OptimizationStatus::ObjectiveStagnationReached
        )
    }
}

/// Result of a solver execution.
#[derive(Debug, Clone)]
pub struct SolverResult<T> {
    /// Final parameters
    pub parameters: T,
    /// Final optimization status
    pub status: OptimizationStatus,
    /// Initial objective value
    pub initial_cost: f64,
    /// Final objective value
    pub final_cost: f64,
    /// Number of outer iterations performed
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: time::Duration,
    /// Convergence statistics
    pub convergence_info: Option<ConvergenceInfo>,
}
