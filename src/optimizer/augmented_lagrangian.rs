//! Augmented Lagrangian method for constrained minimization.
//!
//! Extends the bound-constrained Kelley-Sachs solver to problems with
//! general inequality and equality constraints:
//!
//! ```text
//! min f(x)   subject to   c_k(x) ≤ 0  (inequality)
//!                         c_k(x) = 0  (equality)
//!                         lower ≤ x ≤ upper
//! ```
//!
//! Each inequality constraint enters the augmented Lagrangian through its
//! clamped value `ĉ_k = max(c_k(x), −λ_k/μ)`:
//!
//! ```text
//! L(x) = f(x) + Σ_k [ λ_k·ĉ_k + (μ/2)·ĉ_k² ]
//! ```
//!
//! which equals the classical `max(0, λ + μc)` multiplier form but keeps `L`
//! continuously differentiable: a clamped constraint contributes nothing to
//! the gradient. Equality constraints use `c_k` unclamped everywhere.
//!
//! Per outer iteration the method minimizes `L` over the bounds with the
//! inner Kelley-Sachs solver, then performs the first-order multiplier
//! update `λ_k ← λ_k + μ·ĉ_k(x)` and grows the penalty `μ` whenever the
//! maximum constraint violation failed to shrink sufficiently. Convergence
//! is declared when the inner stationarity measure and the maximum violation
//! are both below their tolerances.
//!
//! # Examples
//!
//! ```no_run
//! use summit_solver::core::TrustRegionState;
//! use summit_solver::criteria::{Circle, Radius};
//! use summit_solver::optimizer::augmented_lagrangian::{AugmentedLagrangian, Constraint};
//! use nalgebra::dvector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Minimize the Circle objective inside the unit disk.
//! let mut state = TrustRegionState::unconstrained(&dvector![0.0, 0.0])?;
//! let mut constraints = [Constraint::inequality(Radius::new(1.0))];
//!
//! let mut solver = AugmentedLagrangian::new();
//! let result = solver.optimize(&mut Circle, &mut constraints, &mut state)?;
//! println!("{} multipliers {:?}", result.status, solver.multipliers());
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - Rockafellar, R. T. (1973). "The Multiplier Method of Hestenes and Powell Applied to Convex Programming". *Journal of Optimization Theory and Applications*.
//! - Bertsekas, D. P. (1996). *Constrained Optimization and Lagrange Multiplier Methods*. Athena Scientific.
//! - Nocedal, J. & Wright, S. (2006). *Numerical Optimization* (2nd ed.). Springer. Chapter 17.

use nalgebra::DVector;
use tracing::{debug, info};
use web_time::Instant;

use crate::core::{CoreResult, Criterion, TrustRegionState};
use crate::optimizer::kelley_sachs::{KelleySachs, KelleySachsConfig};
use crate::optimizer::{
    ConvergenceInfo, OptimizationStatus, OptimizerError, OptimizerResult, SolverResult,
};

/// Hard ceiling on the penalty parameter.
const PENALTY_CEILING: f64 = 1e4;
/// The penalty grows unless the violation dropped below this fraction of the
/// previous outer iteration's violation.
const VIOLATION_DECREASE_FACTOR: f64 = 0.25;

/// How a constraint criterion enters the augmented Lagrangian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `c(x) ≤ 0`; contributes through the clamped value `max(c, −λ/μ)`.
    Inequality,
    /// `c(x) = 0`; contributes unclamped.
    Equality,
}

/// A single constraint: a [`Criterion`] evaluating `c(x)` plus its kind.
///
/// The criterion's `value` is the constraint function itself; `gradient` and
/// `hessian_vector` supply `∇c` and `∇²c·v` for the composite model.
pub struct Constraint {
    kind: ConstraintKind,
    criterion: Box<dyn Criterion>,
}

impl Constraint {
    /// Wrap a criterion as an inequality constraint `c(x) ≤ 0`.
    pub fn inequality(criterion: impl Criterion + 'static) -> Self {
        Self {
            kind: ConstraintKind::Inequality,
            criterion: Box::new(criterion),
        }
    }

    /// Wrap a criterion as an equality constraint `c(x) = 0`.
    pub fn equality(criterion: impl Criterion + 'static) -> Self {
        Self {
            kind: ConstraintKind::Equality,
            criterion: Box::new(criterion),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }
}

/// The augmented Lagrangian of an objective and a constraint set, presented
/// to the inner solver as an ordinary [`Criterion`].
///
/// Holds the multiplier estimates and penalty fixed for the duration of one
/// inner solve; the outer loop rebuilds it after every multiplier update.
pub struct AugLagFunction<'a> {
    objective: &'a mut dyn Criterion,
    constraints: &'a mut [Constraint],
    multipliers: Vec<f64>,
    penalty: f64,
}

impl<'a> AugLagFunction<'a> {
    pub fn new(
        objective: &'a mut dyn Criterion,
        constraints: &'a mut [Constraint],
        multipliers: Vec<f64>,
        penalty: f64,
    ) -> Self {
        Self {
            objective,
            constraints,
            multipliers,
            penalty,
        }
    }

    /// Clamp threshold: an inequality constraint with `c ≤ −λ/μ` is inactive
    /// in the augmented Lagrangian.
    fn clamp_threshold(&self, index: usize) -> f64 {
        -self.multipliers[index] / self.penalty
    }
}

impl Criterion for AugLagFunction<'_> {
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
        let mut total = self.objective.value(x)?;
        for k in 0..self.constraints.len() {
            let c = self.constraints[k].criterion.value(x)?;
            let clamped = match self.constraints[k].kind {
                ConstraintKind::Inequality => c.max(self.clamp_threshold(k)),
                ConstraintKind::Equality => c,
            };
            total += self.multipliers[k] * clamped + 0.5 * self.penalty * clamped * clamped;
        }
        Ok(total)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
        let mut gradient = self.objective.gradient(x)?;
        for k in 0..self.constraints.len() {
            let c = self.constraints[k].criterion.value(x)?;
            let contributes = match self.constraints[k].kind {
                ConstraintKind::Inequality => c > self.clamp_threshold(k),
                ConstraintKind::Equality => true,
            };
            if contributes {
                let constraint_gradient = self.constraints[k].criterion.gradient(x)?;
                gradient.axpy(
                    self.multipliers[k] + self.penalty * c,
                    &constraint_gradient,
                    1.0,
                );
            }
        }
        Ok(gradient)
    }

    fn hessian_vector(
        &mut self,
        x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        let Some(mut result) = self.objective.hessian_vector(x, direction)? else {
            return Ok(None);
        };
        for k in 0..self.constraints.len() {
            let c = self.constraints[k].criterion.value(x)?;
            let contributes = match self.constraints[k].kind {
                ConstraintKind::Inequality => c > self.clamp_threshold(k),
                ConstraintKind::Equality => true,
            };
            if contributes {
                let Some(constraint_hessian_direction) =
                    self.constraints[k].criterion.hessian_vector(x, direction)?
                else {
                    return Ok(None);
                };
                let constraint_gradient = self.constraints[k].criterion.gradient(x)?;
                result.axpy(
                    self.multipliers[k] + self.penalty * c,
                    &constraint_hessian_direction,
                    1.0,
                );
                result.axpy(
                    self.penalty * constraint_gradient.dot(direction),
                    &constraint_gradient,
                    1.0,
                );
            }
        }
        Ok(Some(result))
    }

    fn cache_data(&mut self) {
        self.objective.cache_data();
        for constraint in self.constraints.iter_mut() {
            constraint.criterion.cache_data();
        }
    }
}

/// Configuration parameters for the augmented Lagrangian outer loop.
///
/// The `subproblem` field carries the full inner Kelley-Sachs configuration;
/// post-smoothing is always disabled for the inner solver regardless of its
/// setting there.
#[derive(Debug, Clone)]
pub struct AugmentedLagrangianConfig {
    /// Initial penalty parameter μ
    pub penalty_parameter: f64,
    /// Multiplicative penalty growth factor
    pub penalty_scale_factor: f64,
    /// Maximum number of outer multiplier updates
    pub max_outer_iterations: usize,
    /// Convergence tolerance on the maximum constraint violation
    pub feasibility_tolerance: f64,
    /// Inner bound-constrained solver configuration
    pub subproblem: KelleySachsConfig,
}

impl Default for AugmentedLagrangianConfig {
    fn default() -> Self {
        Self {
            penalty_parameter: 1.0,
            penalty_scale_factor: 1.1,
            max_outer_iterations: 25,
            feasibility_tolerance: 1e-4,
            subproblem: KelleySachsConfig::default(),
        }
    }
}

impl AugmentedLagrangianConfig {
    /// Create a new augmented Lagrangian configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial penalty parameter
    pub fn with_penalty_parameter(mut self, penalty_parameter: f64) -> Self {
        self.penalty_parameter = penalty_parameter;
        self
    }

    /// Set the penalty growth factor
    pub fn with_penalty_scale_factor(mut self, penalty_scale_factor: f64) -> Self {
        self.penalty_scale_factor = penalty_scale_factor;
        self
    }

    /// Set the maximum number of outer iterations
    pub fn with_max_outer_iterations(mut self, max_outer_iterations: usize) -> Self {
        self.max_outer_iterations = max_outer_iterations;
        self
    }

    /// Set the feasibility tolerance
    pub fn with_feasibility_tolerance(mut self, feasibility_tolerance: f64) -> Self {
        self.feasibility_tolerance = feasibility_tolerance;
        self
    }

    /// Set the inner solver configuration
    pub fn with_subproblem(mut self, subproblem: KelleySachsConfig) -> Self {
        self.subproblem = subproblem;
        self
    }

    /// Check parameter consistency before the first iteration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.penalty_parameter <= 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "penalty_parameter must be positive, got {}",
                self.penalty_parameter
            ))
            .log());
        }
        if self.penalty_scale_factor <= 1.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "penalty_scale_factor must exceed 1, got {}",
                self.penalty_scale_factor
            ))
            .log());
        }
        if self.max_outer_iterations == 0 {
            return Err(OptimizerError::InvalidParameters(
                "max_outer_iterations must be at least 1".to_string(),
            )
            .log());
        }
        if self.feasibility_tolerance <= 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "feasibility_tolerance must be positive, got {}",
                self.feasibility_tolerance
            ))
            .log());
        }
        self.subproblem.validate()
    }
}

/// Augmented Lagrangian solver wrapping the Kelley-Sachs inner solver.
///
/// After `optimize` returns, the final multiplier estimates and the history
/// of maximum constraint violations (one entry per outer iteration) remain
/// inspectable on the solver.
pub struct AugmentedLagrangian {
    config: AugmentedLagrangianConfig,
    inner: KelleySachs,
    multipliers: Vec<f64>,
    violation_history: Vec<f64>,
    penalty: f64,
}

impl Default for AugmentedLagrangian {
    fn default() -> Self {
        Self::new()
    }
}

impl AugmentedLagrangian {
    /// Create a new augmented Lagrangian solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(AugmentedLagrangianConfig::default())
    }

    /// Create a new augmented Lagrangian solver with the given configuration.
    pub fn with_config(config: AugmentedLagrangianConfig) -> Self {
        // The multiplier update assumes the inner solve lands exactly on the
        // iterate it measured; the smoothing correction would move past it.
        let mut subproblem = config.subproblem.clone();
        subproblem.disable_post_smoothing = true;
        let penalty = config.penalty_parameter;
        Self {
            config,
            inner: KelleySachs::with_config(subproblem),
            multipliers: Vec::new(),
            violation_history: Vec::new(),
            penalty,
        }
    }

    /// Add an observer to the inner solver; it fires at every inner iteration.
    pub fn add_observer(&mut self, observer: impl crate::optimizer::OptObserver + 'static) {
        self.inner.add_observer(observer);
    }

    /// Final multiplier estimates, one per constraint (empty before the
    /// first `optimize` call).
    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    /// Maximum constraint violation recorded after each outer iteration.
    pub fn violation_history(&self) -> &[f64] {
        &self.violation_history
    }

    /// Current penalty parameter μ.
    pub fn penalty_parameter(&self) -> f64 {
        self.penalty
    }

    /// Minimize the objective subject to the constraints and the bounds held
    /// by `state`.
    ///
    /// Reports `initial_cost`/`final_cost` in terms of the plain objective
    /// `f`, not the augmented Lagrangian. `iterations` counts outer
    /// multiplier updates; evaluation counters accumulate over all inner
    /// solves (composite evaluations).
    pub fn optimize(
        &mut self,
        objective: &mut dyn Criterion,
        constraints: &mut [Constraint],
        state: &mut TrustRegionState,
    ) -> OptimizerResult<SolverResult<DVector<f64>>> {
        self.config.validate()?;
        if constraints.is_empty() {
            return Err(OptimizerError::InvalidParameters(
                "augmented Lagrangian requires at least one constraint".to_string(),
            )
            .log());
        }

        let start_time = Instant::now();
        self.multipliers = vec![0.0; constraints.len()];
        self.violation_history.clear();
        self.penalty = self.config.penalty_parameter;

        let mut initial = state.control().clone();
        state.bounds().project(&mut initial);
        state.set_control(&initial);
        let initial_cost = objective.value(&initial)?;

        let mut value_evaluations: usize = 1;
        let mut gradient_evaluations: usize = 0;
        let mut outer_iterations = 0;
        let mut status = OptimizationStatus::MaxIterationsReached;

        for outer in 1..=self.config.max_outer_iterations {
            outer_iterations = outer;

            let mut composite = AugLagFunction::new(
                objective,
                constraints,
                self.multipliers.clone(),
                self.penalty,
            );
            let inner_result = self.inner.optimize(&mut composite, state)?;
            if let Some(info) = &inner_result.convergence_info {
                value_evaluations += info.value_evaluations;
                gradient_evaluations += info.gradient_evaluations;
            }
            if inner_result.status == OptimizationStatus::InvalidNumericalValues {
                status = OptimizationStatus::InvalidNumericalValues;
                break;
            }

            // First-order multiplier update at the inner solution; equivalent
            // to λ ← max(0, λ + μc) for inequality constraints.
            let x = state.control().clone();
            let mut max_violation = 0.0f64;
            for (k, constraint) in constraints.iter_mut().enumerate() {
                let c = constraint.criterion.value(&x)?;
                let (clamped, violation) = match constraint.kind {
                    ConstraintKind::Inequality => {
                        (c.max(-self.multipliers[k] / self.penalty), c.max(0.0))
                    }
                    ConstraintKind::Equality => (c, c.abs()),
                };
                self.multipliers[k] += self.penalty * clamped;
                max_violation = max_violation.max(violation);
            }

            let previous_violation = self.violation_history.last().copied();
            self.violation_history.push(max_violation);

            debug!(
                "AL outer {:>2}: inner {} in {} iterations, f {:.6e}, violation {:.3e}, penalty {:.2e}",
                outer,
                inner_result.status,
                inner_result.iterations,
                inner_result.final_cost,
                max_violation,
                self.penalty
            );

            if max_violation < self.config.feasibility_tolerance
                && state.stationarity_measure() < self.config.subproblem.gradient_tolerance
            {
                status = OptimizationStatus::Converged;
                break;
            }

            // Grow the penalty when the violation stalled.
            let violation_stalled = match previous_violation {
                Some(previous) => max_violation > VIOLATION_DECREASE_FACTOR * previous,
                None => false,
            };
            if violation_stalled {
                self.penalty =
                    (self.penalty * self.config.penalty_scale_factor).min(PENALTY_CEILING);
            }
        }

        let final_cost = objective.value(state.control())?;
        value_evaluations += 1;
        let final_violation = self.violation_history.last().copied();
        let elapsed = start_time.elapsed();

        info!(
            "Augmented Lagrangian finished: {} after {} outer iterations, objective {:.6e} -> {:.6e}, violation {:.3e}",
            status,
            outer_iterations,
            initial_cost,
            final_cost,
            final_violation.unwrap_or(f64::INFINITY)
        );

        Ok(SolverResult {
            parameters: state.control().clone(),
            status,
            initial_cost,
            final_cost,
            iterations: outer_iterations,
            elapsed_time: elapsed,
            convergence_info: Some(ConvergenceInfo {
                final_stationarity: state.stationarity_measure(),
                final_control_stagnation: state.control_stagnation_measure(),
                value_evaluations,
                gradient_evaluations,
                constraint_violation: final_violation,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Circle, Radius};
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    struct Quadratic;

    impl Criterion for Quadratic {
        fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
            Ok(x[0] * x[0])
        }

        fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
            Ok(dvector![2.0 * x[0]])
        }

        fn hessian_vector(
            &mut self,
            _x: &DVector<f64>,
            direction: &DVector<f64>,
        ) -> CoreResult<Option<DVector<f64>>> {
            Ok(Some(direction.scale(2.0)))
        }
    }

    /// c(x) = 1 − x ≤ 0, i.e. x ≥ 1.
    struct AtLeastOne;

    impl Criterion for AtLeastOne {
        fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
            Ok(1.0 - x[0])
        }

        fn gradient(&mut self, _x: &DVector<f64>) -> CoreResult<DVector<f64>> {
            Ok(dvector![-1.0])
        }

        fn hessian_vector(
            &mut self,
            _x: &DVector<f64>,
            direction: &DVector<f64>,
        ) -> CoreResult<Option<DVector<f64>>> {
            Ok(Some(DVector::zeros(direction.len())))
        }
    }

    /// c(x) = x − 1 = 0.
    struct ExactlyOne;

    impl Criterion for ExactlyOne {
        fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
            Ok(x[0] - 1.0)
        }

        fn gradient(&mut self, _x: &DVector<f64>) -> CoreResult<DVector<f64>> {
            Ok(dvector![1.0])
        }

        fn hessian_vector(
            &mut self,
            _x: &DVector<f64>,
            direction: &DVector<f64>,
        ) -> CoreResult<Option<DVector<f64>>> {
            Ok(Some(DVector::zeros(direction.len())))
        }
    }

    #[test]
    fn test_config_validation_rejects_bad_scale_factor() {
        let config = AugmentedLagrangianConfig::new().with_penalty_scale_factor(0.9);
        assert!(matches!(
            config.validate(),
            Err(OptimizerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_config_validation_rejects_nonpositive_penalty() {
        let config = AugmentedLagrangianConfig::new().with_penalty_parameter(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_constraint_set_rejected() {
        let mut state = TrustRegionState::unconstrained(&dvector![0.0]).unwrap();
        let mut solver = AugmentedLagrangian::new();
        let result = solver.optimize(&mut Quadratic, &mut [], &mut state);
        assert!(matches!(
            result,
            Err(OptimizerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_inequality_constrained_quadratic() {
        // min x² s.t. x ≥ 1: solution x = 1 with multiplier λ = 2.
        let mut state = TrustRegionState::unconstrained(&dvector![3.0]).unwrap();
        let mut constraints = [Constraint::inequality(AtLeastOne)];
        let mut solver = AugmentedLagrangian::new();
        let result = solver
            .optimize(&mut Quadratic, &mut constraints, &mut state)
            .unwrap();

        assert_eq!(result.status, OptimizationStatus::Converged);
        assert_relative_eq!(result.parameters[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(solver.multipliers()[0], 2.0, epsilon = 1e-2);
        assert!(result.convergence_info.unwrap().constraint_violation.unwrap() < 1e-4);
    }

    #[test]
    fn test_violation_shrinks_across_outer_iterations() {
        let mut state = TrustRegionState::unconstrained(&dvector![3.0]).unwrap();
        let mut constraints = [Constraint::inequality(AtLeastOne)];
        let mut solver = AugmentedLagrangian::new();
        solver
            .optimize(&mut Quadratic, &mut constraints, &mut state)
            .unwrap();

        let history = solver.violation_history();
        assert!(!history.is_empty());
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "violation grew: {pair:?}");
        }
    }

    #[test]
    fn test_equality_constrained_quadratic() {
        // min x² s.t. x = 1: solution x = 1 with multiplier λ = −2.
        let mut state = TrustRegionState::unconstrained(&dvector![0.0]).unwrap();
        let mut constraints = [Constraint::equality(ExactlyOne)];
        let mut solver = AugmentedLagrangian::new();
        let result = solver
            .optimize(&mut Quadratic, &mut constraints, &mut state)
            .unwrap();

        assert_eq!(result.status, OptimizationStatus::Converged);
        assert_relative_eq!(result.parameters[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(solver.multipliers()[0], -2.0, epsilon = 1e-2);
    }

    #[test]
    fn test_circle_objective_inside_unit_disk() {
        // The unconstrained minimizer (1, 2) lies outside the disk, so the
        // solution sits on the boundary.
        let mut state = TrustRegionState::unconstrained(&dvector![0.0, 0.0]).unwrap();
        let mut constraints = [Constraint::inequality(Radius::new(1.0))];
        let mut solver = AugmentedLagrangian::new();
        let result = solver
            .optimize(&mut Circle, &mut constraints, &mut state)
            .unwrap();

        let norm = result.parameters.norm();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-2);
        assert!(result.parameters[1] > result.parameters[0]);
        assert!(result.convergence_info.unwrap().constraint_violation.unwrap() < 1e-4);
    }

    #[test]
    fn test_inactive_constraint_leaves_solution_alone() {
        // Minimizer of x² already satisfies x² ≤ 4 strictly; the multiplier
        // stays at zero and the solver reproduces the unconstrained optimum.
        struct BelowFour;
        impl Criterion for BelowFour {
            fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
                Ok(x[0] * x[0] - 4.0)
            }

            fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
                Ok(dvector![2.0 * x[0]])
            }

            fn hessian_vector(
                &mut self,
                _x: &DVector<f64>,
                direction: &DVector<f64>,
            ) -> CoreResult<Option<DVector<f64>>> {
                Ok(Some(direction.scale(2.0)))
            }
        }

        let mut state = TrustRegionState::unconstrained(&dvector![1.5]).unwrap();
        let mut constraints = [Constraint::inequality(BelowFour)];
        let mut solver = AugmentedLagrangian::new();
        let result = solver
            .optimize(&mut Quadratic, &mut constraints, &mut state)
            .unwrap();

        assert_eq!(result.status, OptimizationStatus::Converged);
        assert_relative_eq!(result.parameters[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(solver.multipliers()[0], 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_constraint_kind_accessor() {
        assert_eq!(
            Constraint::inequality(AtLeastOne).kind(),
            ConstraintKind::Inequality
        );
        assert_eq!(
            Constraint::equality(ExactlyOne).kind(),
            ConstraintKind::Equality
        );
    }
}
