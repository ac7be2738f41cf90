use std::time::Instant;

use clap::Parser;
use nalgebra::{DVector, dvector};
use summit_solver::core::{BoundConstraints, CoreResult, Criterion, TrustRegionState};
use summit_solver::criteria::{Circle, Radius};
use summit_solver::optimizer::augmented_lagrangian::{
    AugmentedLagrangian, AugmentedLagrangianConfig, Constraint,
};
use summit_solver::optimizer::kelley_sachs::KelleySachsConfig;
use summit_solver::{init_logger, init_logger_with_level};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "augmented_lagrangian")]
#[command(about = "Solve constrained problems with the augmented Lagrangian method")]
struct Args {
    /// Problem to solve: "disk", "ring", "infeasible", or "all"
    #[arg(short, long, default_value = "disk")]
    problem: String,

    /// Maximum number of outer multiplier updates
    #[arg(short, long, default_value = "25")]
    max_outer_iterations: usize,

    /// Initial penalty parameter
    #[arg(long, default_value = "1.0")]
    penalty: f64,

    /// Multiplicative penalty growth factor
    #[arg(long, default_value = "1.1")]
    penalty_scale: f64,

    /// Convergence tolerance on the maximum constraint violation
    #[arg(long, default_value = "1e-4")]
    feasibility_tolerance: f64,

    /// Enable verbose output (outer- and inner-iteration logs at DEBUG)
    #[arg(short, long)]
    verbose: bool,

    /// Enable detailed profiling output with timing breakdown
    #[arg(long)]
    profile: bool,
}

/// f(x) = x^2, used by the infeasible showcase
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

struct ProblemSetup {
    name: &'static str,
    description: &'static str,
    objective: Box<dyn Criterion>,
    constraints: Vec<Constraint>,
    state: TrustRegionState,
}

fn problem_setup(name: &str) -> CoreResult<Option<ProblemSetup>> {
    let setup = match name {
        // The unconstrained Circle minimizer (1, 2) lies outside the disk
        "disk" => Some(ProblemSetup {
            name: "disk",
            description: "min Circle(x) s.t. |x|^2 <= 1",
            objective: Box::new(Circle),
            constraints: vec![Constraint::inequality(Radius::new(1.0))],
            state: TrustRegionState::unconstrained(&dvector![0.0, 0.0])?,
        }),
        "ring" => Some(ProblemSetup {
            name: "ring",
            description: "min Circle(x) s.t. |x|^2 = 1",
            objective: Box::new(Circle),
            constraints: vec![Constraint::equality(Radius::new(1.0))],
            state: TrustRegionState::unconstrained(&dvector![0.5, 0.5])?,
        }),
        // x >= 1 conflicts with the box upper bound 0.8; the solver presses
        // against the box and reports the residual violation
        "infeasible" => Some(ProblemSetup {
            name: "infeasible",
            description: "min x^2 s.t. x >= 1, x in [0, 0.8]",
            objective: Box::new(Square),
            constraints: vec![Constraint::inequality(AtLeastOne)],
            state: TrustRegionState::new(
                BoundConstraints::new(dvector![0.0], dvector![0.8])?,
                &dvector![0.5],
            )?,
        }),
        _ => None,
    };
    Ok(setup)
}

#[derive(Clone)]
struct ProblemResult {
    problem: String,
    initial_cost: f64,
    final_cost: f64,
    outer_iterations: usize,
    violation: f64,
    multipliers: Vec<f64>,
    time_ms: u128,
    status: String,
    converged: bool,
}

fn format_summary_table(results: &[ProblemResult]) {
    info!("Final summary table:");

    info!(
        "{:<12} | {:<12} | {:<12} | {:<5} | {:<12} | {:<20} | {:<9} | {:<22}",
        "Problem", "Init Cost", "Final Cost", "Outer", "Violation", "Multipliers", "Time(ms)", "Status"
    );
    info!("{}", "-".repeat(125));

    for result in results {
        info!(
            "{:<12} | {:<12.6e} | {:<12.6e} | {:<5} | {:<12.2e} | {:<20} | {:<9} | {:<22}",
            result.problem,
            result.initial_cost,
            result.final_cost,
            result.outer_iterations,
            result.violation,
            format!("{:.3?}", result.multipliers),
            result.time_ms,
            result.status
        );
    }

    info!("{}", "-".repeat(125));

    let converged_count = results.iter().filter(|r| r.converged).count();
    info!(
        "Summary: {}/{} problems converged successfully",
        converged_count,
        results.len()
    );
}

fn solve_problem(
    mut setup: ProblemSetup,
    args: &Args,
) -> Result<ProblemResult, summit_solver::SummitSolverError> {
    info!("Solving {}: {}", setup.name, setup.description);

    let config = AugmentedLagrangianConfig::new()
        .with_penalty_parameter(args.penalty)
        .with_penalty_scale_factor(args.penalty_scale)
        .with_max_outer_iterations(args.max_outer_iterations)
        .with_feasibility_tolerance(args.feasibility_tolerance)
        .with_subproblem(KelleySachsConfig::new());

    let mut solver = AugmentedLagrangian::with_config(config);

    let start_time = Instant::now();
    let result = solver.optimize(
        setup.objective.as_mut(),
        &mut setup.constraints,
        &mut setup.state,
    )?;
    let duration = start_time.elapsed();

    if args.profile {
        info!(
            "[PROFILE] Optimization time: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
        info!("[PROFILE] Outer iterations: {}", result.iterations);
        if let Some(stats) = &result.convergence_info {
            info!(
                "[PROFILE] Evaluations: {} composite objective, {} composite gradient",
                stats.value_evaluations, stats.gradient_evaluations
            );
        }
    }

    let violation = result
        .convergence_info
        .as_ref()
        .and_then(|stats| stats.constraint_violation)
        .unwrap_or(f64::INFINITY);

    info!(
        "{}: {} at {:?} with multipliers {:.4?}",
        setup.name,
        result.status,
        result.parameters.as_slice(),
        solver.multipliers()
    );
    let history: Vec<String> = solver
        .violation_history()
        .iter()
        .map(|v| format!("{:.2e}", v))
        .collect();
    info!(
        "Violation history ({} outer iterations): {:?}",
        history.len(),
        history
    );

    Ok(ProblemResult {
        problem: setup.name.to_string(),
        initial_cost: result.initial_cost,
        final_cost: result.final_cost,
        outer_iterations: result.iterations,
        violation,
        multipliers: solver.multipliers().to_vec(),
        time_ms: duration.as_millis(),
        status: result.status.to_string(),
        converged: result.status.is_converged(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        init_logger_with_level(Level::DEBUG);
    } else {
        init_logger();
    }

    info!("SUMMIT-SOLVER AUGMENTED LAGRANGIAN OPTIMIZATION\n");

    let names = if args.problem == "all" {
        vec!["disk", "ring", "infeasible"]
    } else {
        vec![args.problem.as_str()]
    };

    let mut results = Vec::new();

    for name in &names {
        let setup = match problem_setup(name) {
            Ok(Some(setup)) => setup,
            Ok(None) => {
                warn!(
                    "Unknown problem '{}'. Valid options: disk, ring, infeasible, all",
                    name
                );
                continue;
            }
            Err(e) => {
                warn!("Failed to set up problem {}: {}", name, e);
                continue;
            }
        };
        match solve_problem(setup, &args) {
            Ok(result) => {
                results.push(result);
            }
            Err(e) => {
                warn!("Problem {} failed", name);
                warn!("Error: {}", e);
                warn!("Full error chain:\n{}", e.chain());
            }
        }
    }

    if results.len() > 1 {
        format_summary_table(&results);
    }

    // The infeasible showcase is expected to stop at its iteration cap, so
    // the exit code only requires that every run produced a result
    if results.len() == names.len() {
        info!("All problems completed");
        Ok(())
    } else {
        Err("Some problems failed to run".into())
    }
}
