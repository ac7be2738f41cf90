//! Kelley-Sachs trust-region algorithm for bound-constrained minimization.
//!
//! Solves problems of the form:
//!
//! ```text
//! min f(x)   subject to   lower ≤ x ≤ upper   (componentwise)
//! ```
//!
//! where `f: ℝⁿ → ℝ` is a smooth objective supplied through the
//! [`Criterion`] trait.
//!
//! # Algorithm Overview
//!
//! The method combines an active-set treatment of the bounds with a
//! trust-region Newton iteration on the components estimated free:
//!
//! 1. Classify every component as active (pinned at a bound by the projected
//!    gradient step `P(x − g)`) or inactive.
//! 2. Approximately minimize the quadratic model `g'p + ½p'Hp` over the
//!    inactive subspace with the Steihaug-Toint truncated CG, constrained to
//!    `‖p‖ ≤ Δ`.
//! 3. Project the trial iterate `P(x + p)` back onto the box and evaluate the
//!    step quality:
//!
//! ```text
//! ρ = (actual reduction) / (predicted reduction)
//!   = [f(x) − f(P(x + p))] / [−(g'p + ½p'Hp)]
//! ```
//!
//! 4. Accept when `ρ ≥ ratio_low` and the objective strictly decreased; grow
//!    the radius for high-quality steps (`ρ ≥ ratio_mid`), shrink it on
//!    rejection. A non-positive predicted reduction always rejects.
//! 5. Optionally polish each accepted iterate with an Armijo-backtracked
//!    projected-gradient smoothing step.
//!
//! Convergence is declared through the projected-gradient stationarity
//! measure `‖(P(x − g) − x) ⊙ inactive‖`, which vanishes exactly at points
//! satisfying the first-order conditions of the bound-constrained problem.
//!
//! # Hessian Strategies
//!
//! The quadratic model only needs Hessian-vector products, selected by
//! [`HessianMethod`]: analytic products from the criterion, a limited-memory
//! BFGS approximation fed by accepted steps, or the identity (turning the
//! subproblem into a projected steepest-descent step).
//!
//! # When to Use
//!
//! Kelley-Sachs is the right choice when:
//! - Variables carry physical box constraints that must hold at every iterate
//! - Second-order information is available or can be approximated
//! - Strict monotone descent across accepted iterates is required
//!
//! For constrained problems beyond simple bounds, wrap the objective with
//! [`AugmentedLagrangian`](crate::AugmentedLagrangian), which re-invokes this
//! solver per multiplier update.
//!
//! # Examples
//!
//! ```no_run
//! use summit_solver::core::{BoundConstraints, TrustRegionState};
//! use summit_solver::criteria::Circle;
//! use summit_solver::optimizer::kelley_sachs::{KelleySachs, KelleySachsConfig};
//! use nalgebra::dvector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bounds = BoundConstraints::new(dvector![-5.0, -5.0], dvector![5.0, 5.0])?;
//! let mut state = TrustRegionState::new(bounds, &dvector![0.0, 0.0])?;
//! let mut criterion = Circle;
//!
//! let config = KelleySachsConfig::new()
//!     .with_max_iterations(50)
//!     .with_gradient_tolerance(1e-10);
//! let mut solver = KelleySachs::with_config(config);
//! let result = solver.optimize(&mut criterion, &mut state)?;
//! println!("{} at {:?}", result.status, result.parameters);
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - Kelley, C. T. (1999). *Iterative Methods for Optimization*. SIAM. Chapter 5.
//! - Conn, A. R., Gould, N. I. M., & Toint, P. L. (2000). *Trust-Region Methods*. SIAM.
//! - Steihaug, T. (1983). "The Conjugate Gradient Method and Trust Regions in Large Scale Optimization". *SIAM Journal on Numerical Analysis*.
//! - Bertsekas, D. P. (1982). "Projected Newton Methods for Optimization Problems with Simple Constraints". *SIAM Journal on Control and Optimization*.
//! - Nocedal, J. & Wright, S. (2006). *Numerical Optimization* (2nd ed.). Springer. Chapter 4.

use nalgebra::DVector;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use tracing::{debug, info};
use web_time::{Duration, Instant};

use crate::core::{Criterion, TrustRegionState};
use crate::optimizer::hessian::{HessianMethod, HessianOperator};
use crate::optimizer::steihaug_toint::{CgStopReason, SteihaugTointSolver};
use crate::optimizer::{
    ConvergenceInfo, OptObserverVec, OptimizationStatus, OptimizerError, OptimizerResult,
    SolverResult,
};

/// Armijo sufficient-decrease constant for the post-smoothing line search.
const ARMIJO_DECREASE_CONSTANT: f64 = 1e-4;
/// Post-smoothing halves the projected-gradient step at most this many times.
const MAX_SMOOTHING_ATTEMPTS: usize = 10;

/// Summary statistics for a Kelley-Sachs run.
#[derive(Debug, Clone)]
pub struct KelleySachsSummary {
    /// Initial objective value
    pub initial_cost: f64,
    /// Final objective value
    pub final_cost: f64,
    /// Step quality ρ of the last evaluated trial step
    pub step_quality: f64,
    /// Total number of outer iterations performed
    pub iterations: usize,
    /// Number of accepted trial steps
    pub accepted_steps: usize,
    /// Number of rejected trial steps
    pub rejected_steps: usize,
    /// Trust-region radius at termination
    pub final_radius: f64,
    /// Stationarity measure at the final iterate
    pub final_stationarity: f64,
    /// Average objective reduction per iteration
    pub average_cost_reduction: f64,
    /// Total time elapsed
    pub total_time: Duration,
    /// Average time per iteration
    pub average_time_per_iteration: Duration,
    /// Detailed per-iteration statistics history
    pub iteration_history: Vec<IterationStats>,
    /// Convergence status
    pub convergence_status: OptimizationStatus,
}

impl Display for KelleySachsSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kelley-Sachs Final Result")?;

        if self.convergence_status.is_converged() {
            writeln!(f, "CONVERGED ({:?})", self.convergence_status)?;
        } else {
            writeln!(f, "DIVERGED ({:?})", self.convergence_status)?;
        }

        writeln!(f)?;
        writeln!(f, "Objective:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.abs().max(1e-12)
        )?;
        writeln!(f)?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total:          {}", self.iterations)?;
        writeln!(
            f,
            "  Accepted steps: {} ({:.1}%)",
            self.accepted_steps,
            100.0 * self.accepted_steps as f64 / self.iterations.max(1) as f64
        )?;
        writeln!(
            f,
            "  Rejected steps: {} ({:.1}%)",
            self.rejected_steps,
            100.0 * self.rejected_steps as f64 / self.iterations.max(1) as f64
        )?;
        writeln!(f)?;
        writeln!(f, "Trust Region:")?;
        writeln!(f, "  Final radius:       {:.2e}", self.final_radius)?;
        writeln!(f, "  Last step quality:  {:.2e}", self.step_quality)?;
        writeln!(f, "  Final stationarity: {:.2e}", self.final_stationarity)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Total time:             {:.2}ms",
            self.total_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Average per iteration:  {:.2}ms",
            self.average_time_per_iteration.as_secs_f64() * 1000.0
        )?;

        Ok(())
    }
}

/// Per-iteration statistics for detailed logging (Ceres-style output).
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Outer iteration number (1-indexed)
    pub iteration: usize,
    /// Objective value after this iteration
    pub objective: f64,
    /// Objective change achieved by this iteration (0 when rejected)
    pub objective_change: f64,
    /// Stationarity measure at the iterate the step was computed from
    pub stationarity: f64,
    /// L2 norm of the subproblem step
    pub step_norm: f64,
    /// Step quality ρ = actual / predicted reduction
    pub step_quality: f64,
    /// Trust-region radius after the update
    pub radius: f64,
    /// CG iterations spent in the subproblem
    pub cg_iterations: usize,
    /// Subproblem stopping reason
    pub cg_reason: CgStopReason,
    /// Time taken for this iteration in milliseconds
    pub iter_time_ms: f64,
    /// Total elapsed time since optimization started in milliseconds
    pub total_time_ms: f64,
    /// Whether the step was accepted (true) or rejected (false)
    pub accepted: bool,
}

impl IterationStats {
    /// Print table header in Ceres-style format
    pub fn print_header() {
        debug!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>13}  {:>11}  {:>11}  {:>7}  {:>20}  {:>11}  {:>13}  {:>6}",
            "iter",
            "objective",
            "obj_change",
            "stationarity",
            "|step|",
            "tr_ratio",
            "tr_radius",
            "cg_iter",
            "cg_stop",
            "iter_time",
            "total_time",
            "status"
        );
    }

    /// Print single iteration line in Ceres-style format with scientific notation
    pub fn print_line(&self) {
        let status = if self.accepted { "✓" } else { "✗" };

        debug!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>11.2e}  {:>7}  {:>20}  {:>9.2}ms  {:>11.2}ms  {:>6}",
            self.iteration,
            self.objective,
            self.objective_change,
            self.stationarity,
            self.step_norm,
            self.step_quality,
            self.radius,
            self.cg_iterations,
            self.cg_reason.to_string(),
            self.iter_time_ms,
            self.total_time_ms,
            status
        );
    }
}

/// Configuration parameters for the Kelley-Sachs optimizer.
///
/// Controls the trust-region update strategy, the subproblem solver, the
/// Hessian strategy, and the convergence criteria.
///
/// # Builder Pattern
///
/// ```
/// use summit_solver::optimizer::kelley_sachs::KelleySachsConfig;
/// use summit_solver::optimizer::HessianMethod;
///
/// let config = KelleySachsConfig::new()
///     .with_max_iterations(200)
///     .with_hessian_method(HessianMethod::Lbfgs)
///     .with_radius_bounds(1e-6, 1e3)
///     .with_gradient_tolerance(1e-10);
/// ```
///
/// # Convergence Criteria
///
/// The optimizer terminates when, after an accepted step, ANY of the
/// following holds:
///
/// - **Gradient tolerance**: stationarity < `gradient_tolerance`
/// - **Stationarity tolerance**: stationarity < `stationarity_tolerance`
///   together with actual reduction < `actual_reduction_tolerance`
/// - **Control stagnation**: `max_i |x_i − x_i_prev| < control_stagnation_tolerance`
/// - **Objective stagnation**: `|f − f_prev| < objective_stagnation_tolerance`
///
/// The iteration cap `max_iterations` counts accepted and rejected iterations
/// alike.
#[derive(Debug, Clone)]
pub struct KelleySachsConfig {
    /// Maximum number of outer iterations (accepted + rejected)
    pub max_iterations: usize,
    /// Iteration cap for the Steihaug-Toint subproblem solver
    pub max_subproblem_iterations: usize,
    /// Radius growth factor applied on high-quality accepted steps
    pub trust_region_expansion_factor: f64,
    /// Radius shrink factor applied on rejected steps
    pub trust_region_contraction_factor: f64,
    /// Lower bound on the trust-region radius
    pub min_trust_region_radius: f64,
    /// Upper bound on the trust-region radius
    pub max_trust_region_radius: f64,
    /// Initial radius is `initial_radius_scale · ‖g(x₀)‖`, clamped to the
    /// radius bounds
    pub initial_radius_scale: f64,
    /// Convergence tolerance on the stationarity measure
    pub gradient_tolerance: f64,
    /// Stationarity threshold of the combined stationarity/actual-reduction test
    pub stationarity_tolerance: f64,
    /// Convergence tolerance on the control stagnation measure
    pub control_stagnation_tolerance: f64,
    /// Actual-reduction threshold of the combined test
    pub actual_reduction_tolerance: f64,
    /// Convergence tolerance on the objective stagnation measure
    pub objective_stagnation_tolerance: f64,
    /// Minimum step quality ρ for acceptance
    pub trust_region_ratio_low: f64,
    /// Step quality above which the radius grows
    pub trust_region_ratio_mid: f64,
    /// Upper step-quality bound (recognized and validated for ordering)
    pub trust_region_ratio_upper: f64,
    /// Skip the Armijo projected-gradient smoothing of accepted iterates
    pub disable_post_smoothing: bool,
    /// Hessian strategy for the quadratic model
    pub hessian_method: HessianMethod,
    /// Number of secant pairs kept by the L-BFGS approximation
    pub limited_memory_storage: usize,
    /// Use mean norms (scaled by vector length) in the stationarity and
    /// projected-gradient measures
    pub use_mean_norm: bool,
    /// Absolute residual tolerance of the subproblem solver
    pub cg_tolerance: f64,
    /// Relative residual tolerance of the subproblem solver
    pub cg_relative_tolerance: f64,
    /// Exponent applied to the initial residual norm in the relative test
    pub cg_relative_tolerance_exponent: f64,
}

impl Default for KelleySachsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_subproblem_iterations: 200,
            trust_region_expansion_factor: 2.0,
            trust_region_contraction_factor: 0.5,
            min_trust_region_radius: 1e-8,
            max_trust_region_radius: 1e4,
            initial_radius_scale: 1.0,
            gradient_tolerance: 1e-8,
            stationarity_tolerance: 1e-8,
            control_stagnation_tolerance: 1e-10,
            actual_reduction_tolerance: 1e-10,
            objective_stagnation_tolerance: 1e-12,
            trust_region_ratio_low: 0.1,
            trust_region_ratio_mid: 0.25,
            trust_region_ratio_upper: 0.75,
            disable_post_smoothing: false,
            hessian_method: HessianMethod::Analytical,
            limited_memory_storage: 8,
            use_mean_norm: false,
            cg_tolerance: 1e-8,
            cg_relative_tolerance: 1e-1,
            cg_relative_tolerance_exponent: 0.5,
        }
    }
}

impl KelleySachsConfig {
    /// Create a new Kelley-Sachs configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of outer iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the subproblem iteration cap
    pub fn with_max_subproblem_iterations(mut self, max_subproblem_iterations: usize) -> Self {
        self.max_subproblem_iterations = max_subproblem_iterations;
        self
    }

    /// Set the radius expansion and contraction factors
    pub fn with_radius_factors(mut self, expansion: f64, contraction: f64) -> Self {
        self.trust_region_expansion_factor = expansion;
        self.trust_region_contraction_factor = contraction;
        self
    }

    /// Set the trust-region radius bounds
    pub fn with_radius_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_trust_region_radius = min;
        self.max_trust_region_radius = max;
        self
    }

    /// Set the initial radius scale applied to `‖g(x₀)‖`
    pub fn with_initial_radius_scale(mut self, scale: f64) -> Self {
        self.initial_radius_scale = scale;
        self
    }

    /// Set the gradient tolerance
    pub fn with_gradient_tolerance(mut self, gradient_tolerance: f64) -> Self {
        self.gradient_tolerance = gradient_tolerance;
        self
    }

    /// Set the stationarity tolerance of the combined test
    pub fn with_stationarity_tolerance(mut self, stationarity_tolerance: f64) -> Self {
        self.stationarity_tolerance = stationarity_tolerance;
        self
    }

    /// Set the control stagnation tolerance
    pub fn with_control_stagnation_tolerance(mut self, tolerance: f64) -> Self {
        self.control_stagnation_tolerance = tolerance;
        self
    }

    /// Set the actual-reduction threshold of the combined test
    pub fn with_actual_reduction_tolerance(mut self, tolerance: f64) -> Self {
        self.actual_reduction_tolerance = tolerance;
        self
    }

    /// Set the objective stagnation tolerance
    pub fn with_objective_stagnation_tolerance(mut self, tolerance: f64) -> Self {
        self.objective_stagnation_tolerance = tolerance;
        self
    }

    /// Set the step-quality thresholds (low, mid, upper)
    pub fn with_trust_region_ratios(mut self, low: f64, mid: f64, upper: f64) -> Self {
        self.trust_region_ratio_low = low;
        self.trust_region_ratio_mid = mid;
        self.trust_region_ratio_upper = upper;
        self
    }

    /// Enable or disable the post-smoothing of accepted iterates
    pub fn with_disabled_post_smoothing(mut self, disabled: bool) -> Self {
        self.disable_post_smoothing = disabled;
        self
    }

    /// Set the Hessian strategy
    pub fn with_hessian_method(mut self, hessian_method: HessianMethod) -> Self {
        self.hessian_method = hessian_method;
        self
    }

    /// Set the L-BFGS secant-pair storage
    pub fn with_limited_memory_storage(mut self, limited_memory_storage: usize) -> Self {
        self.limited_memory_storage = limited_memory_storage;
        self
    }

    /// Use mean norms in the stationarity and projected-gradient measures
    pub fn with_mean_norm(mut self, use_mean_norm: bool) -> Self {
        self.use_mean_norm = use_mean_norm;
        self
    }

    /// Set the subproblem residual tolerances (absolute, relative)
    pub fn with_cg_tolerances(mut self, absolute: f64, relative: f64) -> Self {
        self.cg_tolerance = absolute;
        self.cg_relative_tolerance = relative;
        self
    }

    /// Set the exponent of the relative subproblem stopping test
    pub fn with_cg_relative_tolerance_exponent(mut self, exponent: f64) -> Self {
        self.cg_relative_tolerance_exponent = exponent;
        self
    }

    /// Check parameter consistency before the first iteration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.max_iterations == 0 {
            return Err(OptimizerError::InvalidParameters(
                "max_iterations must be at least 1".to_string(),
            )
            .log());
        }
        if self.max_subproblem_iterations == 0 {
            return Err(OptimizerError::InvalidParameters(
                "max_subproblem_iterations must be at least 1".to_string(),
            )
            .log());
        }
        if self.trust_region_expansion_factor <= 1.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "trust_region_expansion_factor must exceed 1, got {}",
                self.trust_region_expansion_factor
            ))
            .log());
        }
        if self.trust_region_contraction_factor <= 0.0 || self.trust_region_contraction_factor >= 1.0
        {
            return Err(OptimizerError::InvalidParameters(format!(
                "trust_region_contraction_factor must lie in (0, 1), got {}",
                self.trust_region_contraction_factor
            ))
            .log());
        }
        if self.min_trust_region_radius <= 0.0
            || self.min_trust_region_radius >= self.max_trust_region_radius
        {
            return Err(OptimizerError::InvalidParameters(format!(
                "trust-region radius bounds must satisfy 0 < min < max, got [{}, {}]",
                self.min_trust_region_radius, self.max_trust_region_radius
            ))
            .log());
        }
        if self.initial_radius_scale <= 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "initial_radius_scale must be positive, got {}",
                self.initial_radius_scale
            ))
            .log());
        }
        let tolerances = [
            ("gradient_tolerance", self.gradient_tolerance),
            ("stationarity_tolerance", self.stationarity_tolerance),
            (
                "control_stagnation_tolerance",
                self.control_stagnation_tolerance,
            ),
            ("actual_reduction_tolerance", self.actual_reduction_tolerance),
            (
                "objective_stagnation_tolerance",
                self.objective_stagnation_tolerance,
            ),
            ("cg_tolerance", self.cg_tolerance),
            ("cg_relative_tolerance", self.cg_relative_tolerance),
            (
                "cg_relative_tolerance_exponent",
                self.cg_relative_tolerance_exponent,
            ),
        ];
        for (name, value) in tolerances {
            if value <= 0.0 {
                return Err(OptimizerError::InvalidParameters(format!(
                    "{name} must be positive, got {value}"
                ))
                .log());
            }
        }
        if !(0.0 <= self.trust_region_ratio_low
            && self.trust_region_ratio_low < self.trust_region_ratio_mid
            && self.trust_region_ratio_mid < self.trust_region_ratio_upper
            && self.trust_region_ratio_upper <= 1.0)
        {
            return Err(OptimizerError::InvalidParameters(format!(
                "trust-region ratios must satisfy 0 <= low < mid < upper <= 1, got ({}, {}, {})",
                self.trust_region_ratio_low,
                self.trust_region_ratio_mid,
                self.trust_region_ratio_upper
            ))
            .log());
        }
        if self.limited_memory_storage == 0 {
            return Err(OptimizerError::InvalidParameters(
                "limited_memory_storage must be at least 1".to_string(),
            )
            .log());
        }
        Ok(())
    }

    /// Print configuration parameters (verbose mode only)
    pub fn print_configuration(&self) {
        debug!(
            "Configuration:\n  Solver:        Kelley-Sachs\n  Hessian:       {}\n  Convergence Criteria:\n  Max iterations:         {}\n  Gradient tolerance:     {:.2e}\n  Stationarity tolerance: {:.2e}\n  Control stagnation:     {:.2e}\n  Actual reduction:       {:.2e}\n  Objective stagnation:   {:.2e}\n  Trust Region:\n  Radius range:       [{:.2e}, {:.2e}]\n  Initial scale:      {:.2}\n  Expansion factor:   {:.2}\n  Contraction factor: {:.2}\n  Step-quality ratios: ({:.2}, {:.2}, {:.2})\n  Subproblem:\n  Max CG iterations:  {}\n  CG tolerance:       {:.2e}\n  CG relative tol:    {:.2e} (exponent {:.2})\n  Numerical Settings:\n  Post-smoothing: {}\n  Mean norm:      {}\n  L-BFGS storage: {}",
            self.hessian_method,
            self.max_iterations,
            self.gradient_tolerance,
            self.stationarity_tolerance,
            self.control_stagnation_tolerance,
            self.actual_reduction_tolerance,
            self.objective_stagnation_tolerance,
            self.min_trust_region_radius,
            self.max_trust_region_radius,
            self.initial_radius_scale,
            self.trust_region_expansion_factor,
            self.trust_region_contraction_factor,
            self.trust_region_ratio_low,
            self.trust_region_ratio_mid,
            self.trust_region_ratio_upper,
            self.max_subproblem_iterations,
            self.cg_tolerance,
            self.cg_relative_tolerance,
            self.cg_relative_tolerance_exponent,
            if self.disable_post_smoothing {
                "disabled"
            } else {
                "enabled"
            },
            if self.use_mean_norm {
                "enabled"
            } else {
                "disabled"
            },
            self.limited_memory_storage
        );
    }
}

/// Kelley-Sachs trust-region solver for bound-constrained problems.
///
/// At each outer iteration the solver classifies the bounds into active and
/// inactive components, solves the trust-region subproblem on the inactive
/// subspace with truncated CG, and accepts or rejects the projected trial
/// point through the ratio test. See the [module documentation](self) for the
/// full algorithm.
///
/// # Examples
///
/// ```no_run
/// use summit_solver::core::TrustRegionState;
/// use summit_solver::criteria::Rosenbrock;
/// use summit_solver::optimizer::kelley_sachs::KelleySachs;
/// use nalgebra::dvector;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut state = TrustRegionState::unconstrained(&dvector![-1.2, 1.0])?;
/// let mut solver = KelleySachs::new();
/// let result = solver.optimize(&mut Rosenbrock, &mut state)?;
/// # Ok(())
/// # }
/// ```
pub struct KelleySachs {
    config: KelleySachsConfig,
    observers: OptObserverVec,
}

impl Default for KelleySachs {
    fn default() -> Self {
        Self::new()
    }
}

impl KelleySachs {
    /// Create a new Kelley-Sachs solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(KelleySachsConfig::default())
    }

    /// Create a new Kelley-Sachs solver with the given configuration.
    pub fn with_config(config: KelleySachsConfig) -> Self {
        Self {
            config,
            observers: OptObserverVec::new(),
        }
    }

    /// Add an observer to monitor optimization progress.
    ///
    /// Observers are notified at every outer iteration with the current
    /// iterate and iteration number.
    pub fn add_observer(&mut self, observer: impl crate::optimizer::OptObserver + 'static) {
        self.observers.add(observer);
    }

    /// Minimize the criterion over the bounds held by `state`.
    ///
    /// The initial guess stored in the state is projected onto the bounds
    /// before the first evaluation. On return the state holds the final
    /// iterate, gradient, objective value and convergence measures; the same
    /// iterate is duplicated into the returned [`SolverResult`].
    ///
    /// # Errors
    ///
    /// Fails fast with [`OptimizerError::InvalidParameters`] on inconsistent
    /// configuration, [`OptimizerError::HessianUnavailable`] when the
    /// `Analytical` strategy meets a criterion without Hessian products, and
    /// propagates criterion evaluation errors unchanged. Non-convergence is
    /// not an error: it is reported through [`OptimizationStatus`].
    pub fn optimize(
        &mut self,
        criterion: &mut dyn Criterion,
        state: &mut TrustRegionState,
    ) -> OptimizerResult<SolverResult<DVector<f64>>> {
        self.config.validate()?;
        let start_time = Instant::now();

        state.set_mean_norm(self.config.use_mean_norm);

        // Feasible start: project the initial guess onto the bounds.
        let mut initial = state.control().clone();
        state.bounds().project(&mut initial);
        state.set_control(&initial);

        let mut value_evaluations: usize = 1;
        let mut gradient_evaluations: usize = 1;
        let objective = criterion.value(&initial)?;
        let gradient = criterion.gradient(&initial)?;
        state.set_objective(objective);
        state.set_gradient(&gradient);
        let initial_cost = objective;

        if !objective.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
            return Ok(self.build_result(
                state,
                OptimizationStatus::InvalidNumericalValues,
                initial_cost,
                0,
                start_time.elapsed(),
                value_evaluations,
                gradient_evaluations,
            ));
        }

        state.set_radius((self.config.initial_radius_scale * gradient.norm()).clamp(
            self.config.min_trust_region_radius,
            self.config.max_trust_region_radius,
        ));

        if tracing::enabled!(tracing::Level::DEBUG) {
            self.config.print_configuration();
            IterationStats::print_header();
        }

        state.compute_active_and_inactive_sets();
        if state.compute_stationarity_measure() < self.config.gradient_tolerance {
            info!(
                "Kelley-Sachs: initial guess already stationary (measure {:.2e})",
                state.stationarity_measure()
            );
            return Ok(self.build_result(
                state,
                OptimizationStatus::GradientToleranceReached,
                initial_cost,
                0,
                start_time.elapsed(),
                value_evaluations,
                gradient_evaluations,
            ));
        }

        let cg = SteihaugTointSolver::new()
            .with_max_iterations(self.config.max_subproblem_iterations)
            .with_tolerance(self.config.cg_tolerance)
            .with_relative_tolerance(self.config.cg_relative_tolerance)
            .with_relative_tolerance_exponent(self.config.cg_relative_tolerance_exponent);
        let mut hessian =
            HessianOperator::new(self.config.hessian_method, self.config.limited_memory_storage);

        let mut iteration: usize = 0;
        let mut accepted_steps: usize = 0;
        let mut rejected_steps: usize = 0;
        let mut total_cost_reduction = 0.0;
        let mut last_step_quality = 0.0;
        let mut iteration_stats: Vec<IterationStats> = Vec::new();

        let status = loop {
            iteration += 1;
            let iter_start = Instant::now();
            let stationarity = state.stationarity_measure();

            // Trust-region subproblem on the inactive subspace.
            let cg_solution = {
                let x = state.control();
                cg.solve(state.gradient(), state.inactive_set(), state.radius(), |d| {
                    hessian.apply(criterion, x, d)
                })?
            };
            let step_norm = cg_solution.step.norm();

            let predicted_reduction = {
                let hessian_step = hessian.apply(criterion, state.control(), &cg_solution.step)?;
                -(state.gradient().dot(&cg_solution.step)
                    + 0.5 * cg_solution.step.dot(&hessian_step))
            };

            let mut trial = state.control() + &cg_solution.step;
            state.bounds().project(&mut trial);
            let trial_objective = criterion.value(&trial)?;
            value_evaluations += 1;
            if !trial_objective.is_finite() {
                break OptimizationStatus::InvalidNumericalValues;
            }

            let actual_reduction = state.objective() - trial_objective;
            let step_quality = actual_reduction / predicted_reduction;
            last_step_quality = step_quality;
            let accepted = predicted_reduction > 0.0
                && actual_reduction > 0.0
                && step_quality >= self.config.trust_region_ratio_low;

            // Stage the trial point: current -> previous, trial -> current.
            state.cache_current_stage_data();
            state.set_control(&trial);
            state.set_objective(trial_objective);

            if accepted {
                let gradient = criterion.gradient(&trial)?;
                gradient_evaluations += 1;
                state.set_gradient(&gradient);
                if gradient.iter().any(|g| !g.is_finite()) {
                    break OptimizationStatus::InvalidNumericalValues;
                }
                criterion.cache_data();

                if !self.config.disable_post_smoothing
                    && apply_post_smoothing(criterion, state, &mut value_evaluations)?
                {
                    let smoothed_gradient = criterion.gradient(state.control())?;
                    gradient_evaluations += 1;
                    state.set_gradient(&smoothed_gradient);
                    if smoothed_gradient.iter().any(|g| !g.is_finite()) {
                        break OptimizationStatus::InvalidNumericalValues;
                    }
                    criterion.cache_data();
                }

                // Secant pair from the whole accepted move, smoothing included.
                let s = state.control() - state.previous_control();
                let y = state.gradient() - state.previous_gradient();
                hessian.update_pair(&s, &y);

                if step_quality >= self.config.trust_region_ratio_mid {
                    state.set_radius(
                        (state.radius() * self.config.trust_region_expansion_factor)
                            .min(self.config.max_trust_region_radius),
                    );
                }

                accepted_steps += 1;
                total_cost_reduction += actual_reduction;

                // Measures at the new iterate feed the convergence tests.
                state.compute_active_and_inactive_sets();
                state.compute_stationarity_measure();
                state.compute_control_stagnation_measure();
                state.compute_objective_stagnation_measure();
            } else {
                state.reset_current_stage_data_to_previous_stage_data();
                state.set_radius(
                    (state.radius() * self.config.trust_region_contraction_factor)
                        .max(self.config.min_trust_region_radius),
                );
                rejected_steps += 1;
            }

            if tracing::enabled!(tracing::Level::DEBUG) {
                let iter_elapsed_ms = iter_start.elapsed().as_secs_f64() * 1000.0;
                let total_elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;

                let stats = IterationStats {
                    iteration,
                    objective: state.objective(),
                    objective_change: state.previous_objective() - state.objective(),
                    stationarity,
                    step_norm,
                    step_quality,
                    radius: state.radius(),
                    cg_iterations: cg_solution.iterations,
                    cg_reason: cg_solution.reason,
                    iter_time_ms: iter_elapsed_ms,
                    total_time_ms: total_elapsed_ms,
                    accepted,
                };

                iteration_stats.push(stats.clone());
                stats.print_line();
            }

            self.observers.set_iteration_metrics(
                state.objective(),
                state.stationarity_measure(),
                state.radius(),
                step_norm,
                Some(step_quality),
            );
            self.observers.notify(state.control(), iteration);

            if let Some(status) = self.check_convergence(
                iteration,
                accepted,
                state.stationarity_measure(),
                actual_reduction,
                state.control_stagnation_measure(),
                state.objective_stagnation_measure(),
            ) {
                break status;
            }
        };

        let elapsed = start_time.elapsed();
        let summary = KelleySachsSummary {
            initial_cost,
            final_cost: state.objective(),
            step_quality: last_step_quality,
            iterations: iteration,
            accepted_steps,
            rejected_steps,
            final_radius: state.radius(),
            final_stationarity: state.stationarity_measure(),
            average_cost_reduction: if iteration > 0 {
                total_cost_reduction / iteration as f64
            } else {
                0.0
            },
            total_time: elapsed,
            average_time_per_iteration: if iteration > 0 {
                elapsed / iteration as u32
            } else {
                Duration::from_secs(0)
            },
            iteration_history: iteration_stats,
            convergence_status: status.clone(),
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!("{}", summary);
        }
        info!(
            "Kelley-Sachs finished: {} after {} iterations, objective {:.6e} -> {:.6e}",
            status,
            iteration,
            initial_cost,
            state.objective()
        );

        Ok(self.build_result(
            state,
            status,
            initial_cost,
            iteration,
            elapsed,
            value_evaluations,
            gradient_evaluations,
        ))
    }

    /// Convergence tests per the outer-loop contract.
    ///
    /// The tolerance tests run only after accepted iterations: a rejected
    /// step restores the previous stage data, which would trip the stagnation
    /// measures spuriously. Tolerance tests take precedence over the
    /// iteration cap so that a converged final iteration reports convergence.
    fn check_convergence(
        &self,
        iteration: usize,
        accepted: bool,
        stationarity: f64,
        actual_reduction: f64,
        control_stagnation: f64,
        objective_stagnation: f64,
    ) -> Option<OptimizationStatus> {
        if accepted {
            if stationarity < self.config.gradient_tolerance {
                return Some(OptimizationStatus::GradientToleranceReached);
            }
            if stationarity < self.config.stationarity_tolerance
                && actual_reduction < self.config.actual_reduction_tolerance
            {
                return Some(OptimizationStatus::StationarityToleranceReached);
            }
            if control_stagnation < self.config.control_stagnation_tolerance {
                return Some(OptimizationStatus::ControlStagnationReached);
            }
            if objective_stagnation < self.config.objective_stagnation_tolerance {
                return Some(OptimizationStatus::ObjectiveStagnationReached);
            }
        }

        if iteration >= self.config.max_iterations {
            return Some(OptimizationStatus::MaxIterationsReached);
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn build_result(
        &self,
        state: &TrustRegionState,
        status: OptimizationStatus,
        initial_cost: f64,
        iterations: usize,
        elapsed: Duration,
        value_evaluations: usize,
        gradient_evaluations: usize,
    ) -> SolverResult<DVector<f64>> {
        SolverResult {
            parameters: state.control().clone(),
            status,
            initial_cost,
            final_cost: state.objective(),
            iterations,
            elapsed_time: elapsed,
            convergence_info: Some(ConvergenceInfo {
                final_stationarity: state.stationarity_measure(),
                final_control_stagnation: state.control_stagnation_measure(),
                value_evaluations,
                gradient_evaluations,
                constraint_violation: None,
            }),
        }
    }
}

/// Armijo-backtracked projected-gradient smoothing of an accepted iterate.
///
/// Starting from `μ = 1`, tries `x_s = P(x − μg)` and accepts once
/// `f(x_s) ≤ f(x) − c·‖x_s − x‖²/μ`, halving `μ` between attempts. Commits
/// the smoothed control and objective into the state and reports whether a
/// smoothing step was taken; the caller refreshes the gradient.
fn apply_post_smoothing(
    criterion: &mut dyn Criterion,
    state: &mut TrustRegionState,
    value_evaluations: &mut usize,
) -> OptimizerResult<bool> {
    let objective = state.objective();
    let mut mu = 1.0;
    for _ in 0..MAX_SMOOTHING_ATTEMPTS {
        let mut smoothed = state.control() - state.gradient().scale(mu);
        state.bounds().project(&mut smoothed);
        let smoothed_objective = criterion.value(&smoothed)?;
        *value_evaluations += 1;

        let correction_norm_squared = (&smoothed - state.control()).norm_squared();
        if smoothed_objective.is_finite()
            && smoothed_objective
                <= objective - ARMIJO_DECREASE_CONSTANT * correction_norm_squared / mu
        {
            state.set_control(&smoothed);
            state.set_objective(smoothed_objective);
            return Ok(true);
        }
        mu *= 0.5;
    }
    Ok(false)
}
