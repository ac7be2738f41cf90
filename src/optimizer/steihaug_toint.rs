//! Truncated conjugate-gradient solver for the trust-region subproblem.
//!
//! Approximately minimizes the quadratic model `g'p + 1/2 p'Hp` subject to
//! `‖p‖ <= radius`, following Steihaug and Toint: plain CG iterations that
//! terminate early when the step reaches the trust-region boundary or the
//! model exposes non-positive curvature. The iteration runs on the inactive
//! subspace of a bound-constrained problem — the residual is masked by the
//! inactive-set indicator and every Hessian product is applied as
//! `inactive ⊙ H(inactive ⊙ d)`, so active components never move.
//!
//! Any stopping reason yields a usable candidate step; the outer algorithm
//! decides acceptance through its ratio test.

use nalgebra::DVector;
use std::fmt;

use crate::optimizer::OptimizerResult;

/// Why the conjugate-gradient iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgStopReason {
    /// Curvature `d·Hd` was NaN.
    NanCurvature,
    /// Curvature was zero to machine precision.
    ZeroCurvature,
    /// Curvature was positive but below `sqrt(machine epsilon)`.
    SmallCurvature,
    /// Negative curvature direction detected.
    NegativeCurvature,
    /// Curvature was infinite.
    InfCurvature,
    /// Residual norm fell below the stopping tolerance.
    Tolerance,
    /// The step reached the trust-region boundary.
    TrustRegionRadius,
    /// Iteration cap reached before the tolerance.
    MaxIterations,
    /// Residual norm became NaN.
    NanNormResidual,
    /// Residual norm became infinite.
    InfNormResidual,
}

impl fmt::Display for CgStopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CgStopReason::NanCurvature => "NaN curvature",
            CgStopReason::ZeroCurvature => "zero curvature",
            CgStopReason::SmallCurvature => "small curvature",
            CgStopReason::NegativeCurvature => "negative curvature",
            CgStopReason::InfCurvature => "infinite curvature",
            CgStopReason::Tolerance => "tolerance",
            CgStopReason::TrustRegionRadius => "trust-region radius",
            CgStopReason::MaxIterations => "max iterations",
            CgStopReason::NanNormResidual => "NaN residual norm",
            CgStopReason::InfNormResidual => "infinite residual norm",
        };
        write!(f, "{}", label)
    }
}

/// Result of one subproblem solve.
#[derive(Debug, Clone)]
pub struct CgSolution {
    /// Candidate step, zero on all active components.
    pub step: DVector<f64>,
    pub reason: CgStopReason,
    /// CG iterations performed.
    pub iterations: usize,
    /// Residual norm at termination.
    pub residual_norm: f64,
}

/// Steihaug-Toint truncated CG with an identity preconditioner.
#[derive(Debug, Clone)]
pub struct SteihaugTointSolver {
    max_iterations: usize,
    tolerance: f64,
    relative_tolerance: f64,
    relative_tolerance_exponent: f64,
}

impl SteihaugTointSolver {
    pub fn new() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
            relative_tolerance: 1e-1,
            relative_tolerance_exponent: 0.5,
        }
    }

    /// Set the iteration cap (default: 200).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the absolute residual tolerance (default: 1e-8).
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative residual tolerance (default: 1e-1).
    pub fn with_relative_tolerance(mut self, relative_tolerance: f64) -> Self {
        self.relative_tolerance = relative_tolerance;
        self
    }

    /// Set the exponent applied to the initial residual norm in the relative
    /// stopping test (default: 0.5).
    pub fn with_relative_tolerance_exponent(mut self, exponent: f64) -> Self {
        self.relative_tolerance_exponent = exponent;
        self
    }

    /// Solve the subproblem at the current iterate.
    ///
    /// `apply_hessian` is the raw Hessian-vector product; the solver masks its
    /// input and output with `inactive_set` so the iteration never leaves the
    /// inactive subspace. The stopping tolerance is
    /// `max(relative_tolerance · ‖r₀‖^exponent, tolerance)`.
    pub fn solve<F>(
        &self,
        gradient: &DVector<f64>,
        inactive_set: &DVector<f64>,
        trust_region_radius: f64,
        mut apply_hessian: F,
    ) -> OptimizerResult<CgSolution>
    where
        F: FnMut(&DVector<f64>) -> OptimizerResult<DVector<f64>>,
    {
        let mut residual = -gradient.component_mul(inactive_set);
        let initial_norm = residual.norm();
        let tolerance = (self.relative_tolerance
            * initial_norm.powf(self.relative_tolerance_exponent))
        .max(self.tolerance);

        let mut step = DVector::zeros(gradient.len());
        if initial_norm <= tolerance {
            return Ok(CgSolution {
                step,
                reason: CgStopReason::Tolerance,
                iterations: 0,
                residual_norm: initial_norm,
            });
        }

        let mut direction = residual.clone();
        let mut residual_norm_squared = residual.norm_squared();

        for iteration in 1..=self.max_iterations {
            let hessian_times_direction = apply_hessian(&direction.component_mul(inactive_set))?
                .component_mul(inactive_set);
            let curvature = direction.dot(&hessian_times_direction);

            if let Some(reason) = classify_invalid_curvature(curvature) {
                let step = boundary_step(&step, &direction, trust_region_radius);
                return Ok(CgSolution {
                    step,
                    reason,
                    iterations: iteration,
                    residual_norm: residual.norm(),
                });
            }

            let alpha = residual_norm_squared / curvature;
            let trial = &step + direction.scale(alpha);
            if trial.norm() > trust_region_radius {
                let step = boundary_step(&step, &direction, trust_region_radius);
                return Ok(CgSolution {
                    step,
                    reason: CgStopReason::TrustRegionRadius,
                    iterations: iteration,
                    residual_norm: residual.norm(),
                });
            }
            step = trial;

            residual.axpy(-alpha, &hessian_times_direction, 1.0);
            let residual_norm = residual.norm();
            let reason = if residual_norm.is_nan() {
                Some(CgStopReason::NanNormResidual)
            } else if residual_norm.is_infinite() {
                Some(CgStopReason::InfNormResidual)
            } else if residual_norm <= tolerance {
                Some(CgStopReason::Tolerance)
            } else {
                None
            };
            if let Some(reason) = reason {
                return Ok(CgSolution {
                    step,
                    reason,
                    iterations: iteration,
                    residual_norm,
                });
            }

            let beta = residual_norm * residual_norm / residual_norm_squared;
            residual_norm_squared = residual_norm * residual_norm;
            direction = &residual + direction.scale(beta);
        }

        let residual_norm = residual.norm();
        Ok(CgSolution {
            step,
            reason: CgStopReason::MaxIterations,
            iterations: self.max_iterations,
            residual_norm,
        })
    }
}

impl Default for SteihaugTointSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Classification order matters: a negative infinity must report as negative
/// curvature, and NaN must fall through the ordered comparisons first.
fn classify_invalid_curvature(curvature: f64) -> Option<CgStopReason> {
    if curvature < 0.0 {
        Some(CgStopReason::NegativeCurvature)
    } else if curvature.abs() <= f64::MIN_POSITIVE {
        Some(CgStopReason::ZeroCurvature)
    } else if curvature.is_infinite() {
        Some(CgStopReason::InfCurvature)
    } else if curvature.is_nan() {
        Some(CgStopReason::NanCurvature)
    } else if curvature.abs() <= f64::EPSILON.sqrt() {
        Some(CgStopReason::SmallCurvature)
    } else {
        None
    }
}

/// Intersection of the ray `p + t·d`, `t >= 0`, with the trust-region
/// boundary: the positive root of `‖p + t·d‖ = radius`. The radicand is
/// clamped at zero against roundoff when `p` already sits on the boundary.
fn boundary_step(step: &DVector<f64>, direction: &DVector<f64>, radius: f64) -> DVector<f64> {
    let step_dot_direction = step.dot(direction);
    let direction_norm_squared = direction.norm_squared();
    if direction_norm_squared <= f64::MIN_POSITIVE {
        return step.clone();
    }
    let radicand = step_dot_direction * step_dot_direction
        + direction_norm_squared * (radius * radius - step.norm_squared());
    let t = (-step_dot_direction + radicand.max(0.0).sqrt()) / direction_norm_squared;
    step + direction.scale(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn ones(n: usize) -> DVector<f64> {
        DVector::from_element(n, 1.0)
    }

    #[test]
    fn test_interior_minimizer_of_convex_quadratic() {
        // Model with H = diag(2, 4), g = (-2, -8): minimizer p* = (1, 2).
        let solver = SteihaugTointSolver::new().with_relative_tolerance(1e-12);
        let gradient = dvector![-2.0, -8.0];
        let solution = solver
            .solve(&gradient, &ones(2), 10.0, |d| {
                Ok(dvector![2.0 * d[0], 4.0 * d[1]])
            })
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::Tolerance);
        assert!(solution.iterations <= 2);
        assert_relative_eq!(solution.step[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(solution.step[1], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_negative_curvature_returns_boundary_step() {
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![3.0, -4.0];
        let radius = 2.5;
        let solution = solver
            .solve(&gradient, &ones(2), radius, |d| Ok(-d.clone()))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::NegativeCurvature);
        assert_eq!(solution.iterations, 1);
        assert_relative_eq!(solution.step.norm(), radius, epsilon = 1e-12);
        // Step points along the negative gradient.
        assert!(solution.step[0] < 0.0 && solution.step[1] > 0.0);
    }

    #[test]
    fn test_zero_curvature_returns_boundary_step() {
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![1.0, 1.0];
        let solution = solver
            .solve(&gradient, &ones(2), 1.0, |d| Ok(DVector::zeros(d.len())))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::ZeroCurvature);
        assert_relative_eq!(solution.step.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_small_positive_curvature_detected() {
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![1.0];
        let solution = solver
            .solve(&gradient, &ones(1), 1.0, |d| Ok(d.scale(1e-12)))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::SmallCurvature);
    }

    #[test]
    fn test_zero_gradient_short_circuits() {
        let solver = SteihaugTointSolver::new();
        let gradient = DVector::zeros(3);
        let solution = solver
            .solve(&gradient, &ones(3), 1.0, |d| Ok(d.clone()))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::Tolerance);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.step.norm(), 0.0);
    }

    #[test]
    fn test_step_truncated_at_trust_region_boundary() {
        // H = I, g = (-10, 0): unconstrained minimizer (10, 0) lies far
        // outside a unit radius.
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![-10.0, 0.0];
        let solution = solver
            .solve(&gradient, &ones(2), 1.0, |d| Ok(d.clone()))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::TrustRegionRadius);
        assert_relative_eq!(solution.step.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(solution.step[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_active_components_never_move() {
        let solver = SteihaugTointSolver::new().with_relative_tolerance(1e-12);
        let gradient = dvector![-2.0, -8.0];
        let inactive = dvector![1.0, 0.0];
        let solution = solver
            .solve(&gradient, &inactive, 10.0, |d| {
                Ok(dvector![2.0 * d[0], 4.0 * d[1]])
            })
            .unwrap();
        assert_eq!(solution.step[1], 0.0);
        assert_relative_eq!(solution.step[0], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_iteration_cap_reported() {
        let solver = SteihaugTointSolver::new()
            .with_max_iterations(1)
            .with_tolerance(1e-15)
            .with_relative_tolerance(1e-15);
        let gradient = dvector![-2.0, -8.0];
        let solution = solver
            .solve(&gradient, &ones(2), 1e3, |d| {
                Ok(dvector![2.0 * d[0], 4.0 * d[1]])
            })
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::MaxIterations);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn test_nan_curvature_classified() {
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![1.0, 2.0];
        let solution = solver
            .solve(&gradient, &ones(2), 1.0, |d| {
                Ok(DVector::from_element(d.len(), f64::NAN))
            })
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::NanCurvature);
        assert_relative_eq!(solution.step.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_infinite_curvature_classified() {
        let solver = SteihaugTointSolver::new();
        let gradient = dvector![1.0];
        let solution = solver
            .solve(&gradient, &ones(1), 1.0, |d| Ok(d.scale(f64::INFINITY)))
            .unwrap();
        assert_eq!(solution.reason, CgStopReason::InfCurvature);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(CgStopReason::Tolerance.to_string(), "tolerance");
        assert_eq!(
            CgStopReason::TrustRegionRadius.to_string(),
            "trust-region radius"
        );
        assert_eq!(
            CgStopReason::NegativeCurvature.to_string(),
            "negative curvature"
        );
    }
}
