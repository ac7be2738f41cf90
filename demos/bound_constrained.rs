use std::time::Instant;

use clap::Parser;
use nalgebra::{DVector, dvector};
use summit_solver::core::{BoundConstraints, CoreResult, Criterion, TrustRegionState};
use summit_solver::criteria::{Circle, Rosenbrock};
use summit_solver::optimizer::hessian::HessianMethod;
use summit_solver::optimizer::kelley_sachs::{KelleySachs, KelleySachsConfig};
use summit_solver::{init_logger, init_logger_with_level};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "bound_constrained")]
#[command(about = "Minimize benchmark objectives over box constraints")]
struct Args {
    /// Problem to solve: "circle", "rosenbrock", "rosenbrock-pinned",
    /// "quadratic-pinned", or "all"
    #[arg(short, long, default_value = "rosenbrock")]
    problem: String,

    /// Maximum number of trust-region iterations
    #[arg(short, long, default_value = "100")]
    max_iterations: usize,

    /// Hessian method: "analytical", "lbfgs", or "none"
    #[arg(long, default_value = "analytical")]
    hessian: String,

    /// Use the dimension-normalized mean norm for stationarity measures
    #[arg(long)]
    mean_norm: bool,

    /// Enable verbose output (per-iteration tables, logged at DEBUG)
    #[arg(short, long)]
    verbose: bool,

    /// Enable detailed profiling output with timing breakdown
    #[arg(long)]
    profile: bool,
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

struct ProblemSetup {
    name: &'static str,
    criterion: Box<dyn Criterion>,
    start: DVector<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
    solution: DVector<f64>,
}

fn problem_setup(name: &str) -> Option<ProblemSetup> {
    match name {
        "circle" => Some(ProblemSetup {
            name: "circle",
            criterion: Box::new(Circle),
            start: dvector![4.0, -3.0],
            lower: dvector![-10.0, -10.0],
            upper: dvector![10.0, 10.0],
            solution: dvector![1.0, 2.0],
        }),
        "rosenbrock" => Some(ProblemSetup {
            name: "rosenbrock",
            criterion: Box::new(Rosenbrock),
            start: dvector![-1.2, 1.0],
            lower: dvector![-2.0, -2.0],
            upper: dvector![2.0, 2.0],
            solution: dvector![1.0, 1.0],
        }),
        // Upper bound 0.5 on x0 cuts the Rosenbrock valley short of (1, 1)
        "rosenbrock-pinned" => Some(ProblemSetup {
            name: "rosenbrock-pinned",
            criterion: Box::new(Rosenbrock),
            start: dvector![-1.2, 1.0],
            lower: dvector![-2.0, -2.0],
            upper: dvector![0.5, 2.0],
            solution: dvector![0.5, 0.25],
        }),
        // Lower bound 0 on x1 keeps the quadratic off its minimizer (3, -1)
        "quadratic-pinned" => Some(ProblemSetup {
            name: "quadratic-pinned",
            criterion: Box::new(ShiftedQuadratic),
            start: dvector![1.0, 5.0],
            lower: dvector![-10.0, 0.0],
            upper: dvector![10.0, 10.0],
            solution: dvector![3.0, 0.0],
        }),
        _ => None,
    }
}

#[derive(Clone)]
struct ProblemResult {
    problem: String,
    hessian: String,
    initial_cost: f64,
    final_cost: f64,
    iterations: usize,
    stationarity: f64,
    distance_to_solution: f64,
    active_components: usize,
    time_ms: u128,
    status: String,
    converged: bool,
}

fn format_summary_table(results: &[ProblemResult]) {
    info!("Final summary table:");

    info!(
        "{:<18} | {:<10} | {:<12} | {:<12} | {:<5} | {:<12} | {:<10} | {:<6} | {:<9} | {:<12}",
        "Problem",
        "Hessian",
        "Init Cost",
        "Final Cost",
        "Iters",
        "Stationarity",
        "Dist(x*)",
        "Active",
        "Time(ms)",
        "Status"
    );
    info!("{}", "-".repeat(130));

    for result in results {
        info!(
            "{:<18} | {:<10} | {:<12.6e} | {:<12.6e} | {:<5} | {:<12.2e} | {:<10.2e} | {:<6} | {:<9} | {:<12}",
            result.problem,
            result.hessian,
            result.initial_cost,
            result.final_cost,
            result.iterations,
            result.stationarity,
            result.distance_to_solution,
            result.active_components,
            result.time_ms,
            result.status
        );
    }

    info!("{}", "-".repeat(130));

    let converged_count = results.iter().filter(|r| r.converged).count();
    info!(
        "Summary: {}/{} problems converged successfully",
        converged_count,
        results.len()
    );
}

fn parse_hessian_method(name: &str) -> HessianMethod {
    match name.to_lowercase().as_str() {
        "analytical" | "analytic" => HessianMethod::Analytical,
        "lbfgs" | "l-bfgs" => HessianMethod::Lbfgs,
        "none" | "identity" => HessianMethod::None,
        other => {
            warn!("Invalid Hessian method '{}'. Using analytical as default.", other);
            HessianMethod::Analytical
        }
    }
}

fn solve_problem(
    mut setup: ProblemSetup,
    args: &Args,
) -> Result<ProblemResult, summit_solver::SummitSolverError> {
    info!(
        "Solving {} over the box [{:.1}, {:.1}] x [{:.1}, {:.1}] from {:?}",
        setup.name, setup.lower[0], setup.upper[0], setup.lower[1], setup.upper[1], setup.start
    );

    let setup_start = Instant::now();
    let bounds = BoundConstraints::new(setup.lower.clone(), setup.upper.clone())?;
    let mut state = TrustRegionState::new(bounds, &setup.start)?;
    let setup_time = setup_start.elapsed();

    if args.profile {
        info!(
            "[PROFILE] Problem setup time: {:.2}ms",
            setup_time.as_secs_f64() * 1000.0
        );
    }

    let hessian_method = parse_hessian_method(&args.hessian);
    let config = KelleySachsConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_hessian_method(hessian_method)
        .with_mean_norm(args.mean_norm);

    let mut solver = KelleySachs::with_config(config);

    let start_time = Instant::now();
    let result = solver.optimize(setup.criterion.as_mut(), &mut state)?;
    let duration = start_time.elapsed();

    if args.profile {
        info!(
            "[PROFILE] Optimization time: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
        info!("[PROFILE] Total iterations: {}", result.iterations);
        if result.iterations > 0 {
            info!(
                "[PROFILE] Time per iteration: {:.2}ms",
                duration.as_secs_f64() * 1000.0 / result.iterations as f64
            );
        }
        if let Some(stats) = &result.convergence_info {
            info!(
                "[PROFILE] Evaluations: {} objective, {} gradient",
                stats.value_evaluations, stats.gradient_evaluations
            );
        }
    }

    let stationarity = result
        .convergence_info
        .as_ref()
        .map(|info| info.final_stationarity)
        .unwrap_or(f64::INFINITY);
    let distance_to_solution = (state.control() - &setup.solution).norm();
    let active_components = state.active_set().iter().filter(|&&a| a == 1.0).count();

    info!(
        "{}: {} at {:?} (distance to known solution {:.2e}, {} active bound{})",
        setup.name,
        result.status,
        state.control().as_slice(),
        distance_to_solution,
        active_components,
        if active_components == 1 { "" } else { "s" }
    );

    Ok(ProblemResult {
        problem: setup.name.to_string(),
        hessian: hessian_method.to_string(),
        initial_cost: result.initial_cost,
        final_cost: result.final_cost,
        iterations: result.iterations,
        stationarity,
        distance_to_solution,
        active_components,
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

    info!("SUMMIT-SOLVER BOUND-CONSTRAINED OPTIMIZATION\n");

    let names = if args.problem == "all" {
        vec!["circle", "rosenbrock", "rosenbrock-pinned", "quadratic-pinned"]
    } else {
        vec![args.problem.as_str()]
    };

    let mut results = Vec::new();

    for name in &names {
        let Some(setup) = problem_setup(name) else {
            warn!(
                "Unknown problem '{}'. Valid options: circle, rosenbrock, rosenbrock-pinned, quadratic-pinned, all",
                name
            );
            continue;
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

    let converged_count = results.iter().filter(|r| r.converged).count();
    if results.is_empty() {
        Err("No problems were run".into())
    } else if converged_count == results.len() {
        info!("All problems converged successfully");
        Ok(())
    } else {
        info!("{}/{} problems converged", converged_count, results.len());
        Err("Some problems failed to converge".into())
    }
}
