//! # Summit Solver
//!
//! A Rust library for bound-constrained and constrained nonlinear optimization, built
//! around a projected trust-region method for problems where every objective evaluation
//! may stand for an expensive simulation.
//!
//! ## Features
//!
//! - **Kelley-Sachs Trust Region**: Projected Newton-type solver for `min f(x)` subject
//!   to elementwise bounds `lower ≤ x ≤ upper`, with active-set estimation and a
//!   Steihaug-Toint truncated CG subproblem solver
//! - **Augmented Lagrangian**: Outer loop handling general inequality and equality
//!   constraints on top of the bound-constrained solver
//! - **Pluggable Second-Order Information**: Analytic Hessian-vector products, limited-memory
//!   BFGS approximation, or none (steepest-descent steps)
//! - **Matrix-Free Throughout**: The dense Hessian is never formed; all curvature enters
//!   through Hessian-vector products
//!
//! ## Solver Types
//!
//! - **Kelley-Sachs**: Bound-constrained trust region with projected-gradient active sets
//! - **Augmented Lagrangian**: General constraints via multiplier estimates and an
//!   adaptive penalty
//!
//! ## Defining a Problem
//!
//! Implement [`core::Criterion`] for your objective (value, gradient, and optionally
//! Hessian-vector products), build a [`core::TrustRegionState`] from the bounds and the
//! starting point, and hand both to a solver:
//!
//! ```no_run
//! use summit_solver::core::{BoundConstraints, TrustRegionState};
//! use summit_solver::criteria::Rosenbrock;
//! use summit_solver::optimizer::KelleySachs;
//! use nalgebra::dvector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bounds = BoundConstraints::new(dvector![-2.0, -2.0], dvector![2.0, 2.0])?;
//! let mut state = TrustRegionState::new(bounds, &dvector![-1.2, 1.0])?;
//!
//! let mut solver = KelleySachs::new();
//! let result = solver.optimize(&mut Rosenbrock, &mut state)?;
//! println!("{:?} -> {}", result.parameters, result.status);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod criteria;
pub mod error;
#[cfg(feature = "logging")]
pub mod logger;
pub mod observers;
pub mod optimizer;

// Re-export core types
pub use core::{BoundConstraints, Criterion, TrustRegionState};
pub use error::{SummitSolverError, SummitSolverResult};

#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{
    AugmentedLagrangian, Constraint, ConstraintKind, HessianMethod, KelleySachs, OptObserver,
    OptObserverVec, SolverResult, augmented_lagrangian::AugmentedLagrangianConfig,
    kelley_sachs::KelleySachsConfig,
};
