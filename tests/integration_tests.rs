//! Integration tests for Summit Solver
//!
//! These tests verify end-to-end optimization behavior on analytic benchmark
//! problems. They ensure that the solvers converge correctly, respect bounds
//! and constraints at every iterate, and report consistent diagnostics.
//!
//! # Test Coverage
//!
//! - **Bound-constrained solves**: interior optima, optima pinned to a bound,
//!   degenerate single-point boxes, out-of-bounds starting points
//! - **Constrained solves**: augmented Lagrangian on inequality-constrained
//!   problems, including an infeasible problem
//! - **Solver invariants**: monotone objective decrease, trust-region radius
//!   bounds, active/inactive set partitioning
//!
//! # Metrics Verified
//!
//! Each test verifies a subset of:
//! - Final parameters match the known solution
//! - Optimization converges with an expected status
//! - Final objective and stationarity are finite and small
//! - Every visited iterate satisfies the bound constraints
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

use nalgebra::{DVector, dvector};
use std::sync::{Arc, Mutex};
use summit_solver::core::{BoundConstraints, CoreResult, Criterion, TrustRegionState};
use summit_solver::criteria::{Radius, Rosenbrock};
use summit_solver::observers::OptObserver;
use summit_solver::optimizer::OptimizationStatus;
use summit_solver::optimizer::augmented_lagrangian::{AugmentedLagrangian, Constraint};
use summit_solver::optimizer::hessian::HessianMethod;
use summit_solver::optimizer::kelley_sachs::{KelleySachs, KelleySachsConfig};

/// Test result capturing optimization metrics for one solve
#[derive(Debug)]
#[allow(dead_code)]
struct RunSummary {
    problem: String,
    initial_cost: f64,
    final_cost: f64,
    improvement_pct: f64,
    iterations: usize,
    status: OptimizationStatus,
    success: bool,
    stationarity: f64,
}

/// Quadratic bowl with minimizer (3, -1): f = (x0-3)^2 + 2(x1+1)^2
struct ShiftedQuadratic;

impl Criterion for ShiftedQuadratic {
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
        Ok((x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2))
    }

    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
        Ok(dvector![2.0 * (x[0] - 3.0), 4.0 * (x[1] + 1.0)])
    }

    fn hessian_vector(
        &mut self,
        _x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        Ok(Some(dvector![2.0 * direction[0], 4.0 * direction[1]]))
    }
}

/// Observer recording per-iteration metrics and visited iterates
struct MetricsRecorder {
    objectives: Arc<Mutex<Vec<f64>>>,
    radii: Arc<Mutex<Vec<f64>>>,
    controls: Arc<Mutex<Vec<DVector<f64>>>>,
}

impl MetricsRecorder {
    fn new() -> Self {
        Self {
            objectives: Arc::new(Mutex::new(Vec::new())),
            radii: Arc::new(Mutex::new(Vec::new())),
            controls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn handles(
        &self,
    ) -> (
        Arc<Mutex<Vec<f64>>>,
        Arc<Mutex<Vec<f64>>>,
        Arc<Mutex<Vec<DVector<f64>>>>,
    ) {
        (
            Arc::clone(&self.objectives),
            Arc::clone(&self.radii),
            Arc::clone(&self.controls),
        )
    }
}

impl OptObserver for MetricsRecorder {
    fn on_step(&self, control: &DVector<f64>, _iteration: usize) {
        if let Ok(mut log) = self.controls.lock() {
            log.push(control.clone());
        }
    }

    fn set_iteration_metrics(
        &self,
        objective: f64,
        _stationarity: f64,
        radius: f64,
        _step_norm: f64,
        _step_quality: Option<f64>,
    ) {
        if let Ok(mut log) = self.objectives.lock() {
            log.push(objective);
        }
        if let Ok(mut log) = self.radii.lock() {
            log.push(radius);
        }
    }
}

/// Run the bound-constrained solver and collect a summary
///
/// # Arguments
///
/// * `problem` - Name used in assertion messages
/// * `criterion` - Objective to minimize
/// * `state` - Prepared state (bounds and starting point); holds the final
///   iterate, sets, and measures after the call
/// * `solver` - Configured solver, possibly with observers attached
fn run_bound_constrained(
    problem: &str,
    criterion: &mut dyn Criterion,
    state: &mut TrustRegionState,
    solver: &mut KelleySachs,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let result = solver.optimize(criterion, state)?;

    let improvement_pct = if result.initial_cost > 0.0 {
        ((result.initial_cost - result.final_cost) / result.initial_cost) * 100.0
    } else {
        0.0
    };

    let stationarity = result
        .convergence_info
        .as_ref()
        .map(|info| info.final_stationarity)
        .unwrap_or(f64::INFINITY);

    Ok(RunSummary {
        problem: problem.to_string(),
        initial_cost: result.initial_cost,
        final_cost: result.final_cost,
        improvement_pct,
        iterations: result.iterations,
        status: result.status.clone(),
        success: result.status.is_converged(),
        stationarity,
    })
}

// ============================================================================
// Bound-Constrained Integration Tests
// ============================================================================

/// Test convergence to an interior minimizer with wide, inactive bounds.
///
/// The start sits on the lower face of the box; both bounds are inactive at
/// the optimum (3, -1).
#[test]
fn test_interior_minimum_with_wide_bounds() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![0.0, -10.0], dvector![10.0, 10.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![0.0, 0.0])?;
    let mut solver = KelleySachs::new();

    let summary =
        run_bound_constrained("interior quadratic", &mut ShiftedQuadratic, &mut state, &mut solver)?;

    assert!(
        summary.success,
        "Optimization did not converge. Status: {:?}, Iterations: {}, Final cost: {}",
        summary.status, summary.iterations, summary.final_cost
    );
    assert!(
        (state.control()[0] - 3.0).abs() < 1e-6,
        "x0 should reach 3, got {}",
        state.control()[0]
    );
    assert!(
        (state.control()[1] + 1.0).abs() < 1e-6,
        "x1 should reach -1, got {}",
        state.control()[1]
    );
    assert!(
        summary.stationarity < 1e-6,
        "Stationarity too large at interior optimum: {:.2e}",
        summary.stationarity
    );

    // No bound is active at an interior optimum
    for i in 0..state.dim() {
        assert_eq!(
            state.active_set()[i],
            0.0,
            "component {} flagged active at an interior optimum",
            i
        );
    }

    Ok(())
}

/// Test that an optimum pinned to a bound is recognized as stationary.
///
/// The unconstrained minimizer of the quadratic sits at x1 = -1, below the
/// box. The solver must stop at the face x1 = 0 with the projected gradient
/// vanishing even though the raw gradient does not.
#[test]
fn test_bound_active_at_solution() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![-10.0, 0.0], dvector![10.0, 10.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![1.0, 5.0])?;
    let mut solver = KelleySachs::new();

    let summary =
        run_bound_constrained("pinned quadratic", &mut ShiftedQuadratic, &mut state, &mut solver)?;

    assert!(
        summary.success,
        "Optimization did not converge. Status: {:?}, Iterations: {}",
        summary.status, summary.iterations
    );
    assert!(
        (state.control()[0] - 3.0).abs() < 1e-6,
        "free component should reach 3, got {}",
        state.control()[0]
    );
    assert!(
        state.control()[1].abs() < 1e-10,
        "bounded component should land exactly on the face, got {}",
        state.control()[1]
    );
    assert_eq!(
        state.active_set()[1],
        1.0,
        "lower bound on x1 should be active at the solution"
    );
    assert!(
        summary.stationarity < 1e-6,
        "Projected stationarity should vanish on the active face: {:.2e}",
        summary.stationarity
    );

    Ok(())
}

/// Test that a starting point outside the box is projected before iteration 1
/// and that every visited iterate stays inside the box.
#[test]
fn test_iterates_respect_bounds() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![0.0, 0.0], dvector![2.0, 2.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![-5.0, 5.0])?;

    let recorder = MetricsRecorder::new();
    let (_, _, controls) = recorder.handles();
    let mut solver = KelleySachs::new();
    solver.add_observer(recorder);

    let summary =
        run_bound_constrained("bounded Rosenbrock", &mut Rosenbrock, &mut state, &mut solver)?;

    assert!(
        summary.success,
        "Optimization did not converge. Status: {:?}",
        summary.status
    );
    assert!(
        (state.control()[0] - 1.0).abs() < 1e-4 && (state.control()[1] - 1.0).abs() < 1e-4,
        "Rosenbrock minimizer not reached: {:?}",
        state.control()
    );

    let visited = controls.lock().unwrap();
    assert!(!visited.is_empty(), "observer recorded no iterates");
    for (k, control) in visited.iter().enumerate() {
        for i in 0..control.len() {
            assert!(
                control[i] >= -1e-12 && control[i] <= 2.0 + 1e-12,
                "iterate {} leaves the box at component {}: {}",
                k,
                i,
                control[i]
            );
        }
    }

    Ok(())
}

/// Test that the committed objective value never increases across iterations.
///
/// Rejected trial steps restore the previous iterate, so the per-iteration
/// objective sequence reported to observers must be non-increasing.
#[test]
fn test_objective_monotone_over_iterations() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![-2.0, -2.0], dvector![2.0, 2.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![-1.2, 1.0])?;

    let recorder = MetricsRecorder::new();
    let (objectives, _, _) = recorder.handles();
    let mut solver = KelleySachs::new();
    solver.add_observer(recorder);

    run_bound_constrained("monotone Rosenbrock", &mut Rosenbrock, &mut state, &mut solver)?;

    let log = objectives.lock().unwrap();
    assert!(log.len() > 1, "expected multiple iterations, got {}", log.len());
    for window in log.windows(2) {
        assert!(
            window[1] <= window[0] + 1e-12,
            "objective increased between iterations: {} -> {}",
            window[0],
            window[1]
        );
    }

    Ok(())
}

/// Test that the trust-region radius reported after every update stays
/// within the configured [min, max] interval.
#[test]
fn test_trust_region_radius_stays_bounded() -> Result<(), Box<dyn std::error::Error>> {
    let min_radius = 1e-8;
    let max_radius = 10.0;
    let config = KelleySachsConfig::new().with_radius_bounds(min_radius, max_radius);

    let bounds = BoundConstraints::new(dvector![-2.0, -2.0], dvector![2.0, 2.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![-1.2, 1.0])?;

    let recorder = MetricsRecorder::new();
    let (_, radii, _) = recorder.handles();
    let mut solver = KelleySachs::with_config(config);
    solver.add_observer(recorder);

    run_bound_constrained("radius bounds", &mut Rosenbrock, &mut state, &mut solver)?;

    let log = radii.lock().unwrap();
    assert!(!log.is_empty());
    for (k, radius) in log.iter().enumerate() {
        assert!(
            *radius >= min_radius && *radius <= max_radius,
            "radius left its bounds at iteration {}: {}",
            k,
            radius
        );
    }

    Ok(())
}

/// Test that the active and inactive sets partition the components: for every
/// component exactly one of the two indicator entries is 1.
#[test]
fn test_active_and_inactive_sets_partition() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![-10.0, 0.0], dvector![10.0, 10.0])?;
    let mut state = TrustRegionState::new(bounds, &dvector![1.0, 5.0])?;
    let mut solver = KelleySachs::new();

    run_bound_constrained("set partition", &mut ShiftedQuadratic, &mut state, &mut solver)?;

    for i in 0..state.dim() {
        let active = state.active_set()[i];
        let inactive = state.inactive_set()[i];
        assert!(
            active == 0.0 || active == 1.0,
            "active indicator not binary at {}: {}",
            i,
            active
        );
        assert_eq!(
            active + inactive,
            1.0,
            "active/inactive sets fail to partition component {}",
            i
        );
    }

    Ok(())
}

/// Test that a degenerate box with lower == upper terminates immediately:
/// the single feasible point is stationary by projection.
#[test]
fn test_single_point_box_is_stationary() -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundConstraints::new(dvector![1.5, 1.5], dvector![1.5, 1.5])?;
    let mut state = TrustRegionState::new(bounds, &dvector![0.0, 0.0])?;
    let mut solver = KelleySachs::new();

    let summary =
        run_bound_constrained("single-point box", &mut ShiftedQuadratic, &mut state, &mut solver)?;

    assert_eq!(
        summary.status,
        OptimizationStatus::GradientToleranceReached,
        "expected immediate stationarity, got {:?}",
        summary.status
    );
    assert_eq!(summary.iterations, 0, "no iterations should be needed");
    assert_eq!(state.control()[0], 1.5);
    assert_eq!(state.control()[1], 1.5);

    Ok(())
}

/// Test that the L-BFGS and analytic Hessian configurations agree on the
/// minimizer they find.
#[test]
fn test_hessian_methods_agree_on_rosenbrock() -> Result<(), Box<dyn std::error::Error>> {
    let mut solutions = Vec::new();
    for method in [HessianMethod::Analytical, HessianMethod::Lbfgs] {
        let config = KelleySachsConfig::new()
            .with_hessian_method(method)
            .with_max_iterations(300);
        let bounds = BoundConstraints::new(dvector![-2.0, -2.0], dvector![2.0, 2.0])?;
        let mut state = TrustRegionState::new(bounds, &dvector![-1.2, 1.0])?;
        let mut solver = KelleySachs::with_config(config);

        let summary =
            run_bound_constrained("hessian comparison", &mut Rosenbrock, &mut state, &mut solver)?;
        assert!(
            summary.success,
            "{:?} Hessian did not converge: {:?}",
            method, summary.status
        );
        solutions.push(state.control().clone());
    }

    let difference = (&solutions[0] - &solutions[1]).norm();
    assert!(
        difference < 1e-3,
        "Hessian methods disagree on the minimizer: {:?} vs {:?}",
        solutions[0],
        solutions[1]
    );

    Ok(())
}

// ============================================================================
// Augmented Lagrangian Integration Tests
// ============================================================================

/// Test the augmented Lagrangian on a quadratic restricted to the unit disk.
///
/// The unconstrained minimizer (3, -1) lies outside the disk, so the
/// constrained solution sits on the boundary with a positive multiplier.
#[test]
fn test_augmented_lagrangian_on_unit_disk() -> Result<(), Box<dyn std::error::Error>> {
    let mut state = TrustRegionState::unconstrained(&dvector![0.0, 0.0])?;
    let mut constraints = [Constraint::inequality(Radius::new(1.0))];
    let mut solver = AugmentedLagrangian::new();

    let result = solver.optimize(&mut ShiftedQuadratic, &mut constraints, &mut state)?;

    let violation = result
        .convergence_info
        .as_ref()
        .and_then(|info| info.constraint_violation)
        .ok_or("missing constraint violation")?;
    assert!(
        violation < 1e-4,
        "solution is infeasible: violation {:.2e}",
        violation
    );
    assert!(
        (result.parameters.norm() - 1.0).abs() < 1e-2,
        "solution should sit on the disk boundary, got norm {}",
        result.parameters.norm()
    );
    assert!(
        result.parameters[0] > 0.8 && result.parameters[1] < -0.3,
        "solution in the wrong quadrant: {:?}",
        result.parameters
    );
    assert!(
        solver.multipliers()[0] > 0.0,
        "active inequality constraint needs a positive multiplier, got {}",
        solver.multipliers()[0]
    );

    Ok(())
}

/// Test that the recorded maximum violation never increases across outer
/// iterations on a feasible problem.
#[test]
fn test_augmented_lagrangian_violation_decreases() -> Result<(), Box<dyn std::error::Error>> {
    let mut state = TrustRegionState::unconstrained(&dvector![0.0, 0.0])?;
    let mut constraints = [Constraint::inequality(Radius::new(1.0))];
    let mut solver = AugmentedLagrangian::new();

    solver.optimize(&mut ShiftedQuadratic, &mut constraints, &mut state)?;

    let history = solver.violation_history();
    assert!(!history.is_empty(), "no outer iterations recorded");
    for window in history.windows(2) {
        assert!(
            window[1] <= window[0] + 1e-9,
            "violation grew between outer iterations: {} -> {}",
            window[0],
            window[1]
        );
    }

    Ok(())
}

/// Test the augmented Lagrangian on an infeasible problem: the constraint
/// x >= 1 conflicts with the box upper bound 0.8.
///
/// The solver cannot converge; it must run out of outer iterations with the
/// iterate pressed against the box and the violation settled at 0.2.
#[test]
fn test_augmented_lagrangian_infeasible_problem() -> Result<(), Box<dyn std::error::Error>> {
    /// c(x) = 1 - x <= 0, i.e. x >= 1
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

    /// f(x) = x^2
    struct Square;
    impl Criterion for Square {
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

    let bounds = BoundConstraints::new(dvector![0.0], dvector![0.8])?;
    let mut state = TrustRegionState::new(bounds, &dvector![0.5])?;
    let mut constraints = [Constraint::inequality(AtLeastOne)];
    let mut solver = AugmentedLagrangian::new();

    let result = solver.optimize(&mut Square, &mut constraints, &mut state)?;

    assert_eq!(
        result.status,
        OptimizationStatus::MaxIterationsReached,
        "infeasible problem must exhaust its outer iterations, got {:?}",
        result.status
    );
    let violation = result
        .convergence_info
        .as_ref()
        .and_then(|info| info.constraint_violation)
        .ok_or("missing constraint violation")?;
    assert!(
        (violation - 0.2).abs() < 1e-2,
        "violation should settle at the geometric gap 0.2, got {}",
        violation
    );
    assert!(
        (result.parameters[0] - 0.8).abs() < 1e-3,
        "iterate should press against the box upper bound, got {}",
        result.parameters[0]
    );

    Ok(())
}
