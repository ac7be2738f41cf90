//! Trust-region optimization state
//!
//! `TrustRegionState` is the single owner of everything mutable during a
//! solve: the current/previous iterate and gradient, the objective history,
//! the bounds, the active/inactive index sets, the trust-region radius, and
//! the derived scalar measures. It makes no algorithmic decisions; solvers
//! borrow it mutably for the duration of one `optimize` call.

use nalgebra::DVector;

use crate::core::bounds::BoundConstraints;
use crate::core::vector::{max_abs_diff, reduced_norm};
use crate::core::{CoreError, CoreResult};

/// Mutable state shared between the outer trust-region loop and the
/// subproblem solver.
///
/// Every setter performs a deep value copy; the state never aliases caller
/// memory. Derived measures are recomputed on demand and cached, so the
/// matching getters return the value from the last `compute_*` call.
#[derive(Debug, Clone)]
pub struct TrustRegionState {
    current_control: DVector<f64>,
    previous_control: DVector<f64>,
    current_gradient: DVector<f64>,
    previous_gradient: DVector<f64>,
    current_objective: f64,
    previous_objective: f64,

    bounds: BoundConstraints,
    active_set: DVector<f64>,
    inactive_set: DVector<f64>,

    trust_region_radius: f64,

    stationarity: f64,
    control_stagnation: f64,
    objective_stagnation: f64,
    norm_projected_gradient: f64,
    use_mean_norm: bool,

    work: DVector<f64>,
}

impl TrustRegionState {
    /// Create the state from bounds and an initial guess.
    ///
    /// The guess is stored as both current and previous iterate; it is not
    /// projected here — the solver projects it when initializing. Objective
    /// values start at infinity ("not yet evaluated"), the active set empty,
    /// and the radius at zero until the solver assigns it.
    pub fn new(bounds: BoundConstraints, initial_guess: &DVector<f64>) -> CoreResult<Self> {
        if initial_guess.len() != bounds.dim() {
            return Err(CoreError::DimensionMismatch(format!(
                "initial guess has {} entries, bounds cover {}",
                initial_guess.len(),
                bounds.dim()
            )));
        }
        let dim = bounds.dim();
        Ok(Self {
            current_control: initial_guess.clone(),
            previous_control: initial_guess.clone(),
            current_gradient: DVector::zeros(dim),
            previous_gradient: DVector::zeros(dim),
            current_objective: f64::INFINITY,
            previous_objective: f64::INFINITY,
            bounds,
            active_set: DVector::zeros(dim),
            inactive_set: DVector::from_element(dim, 1.0),
            trust_region_radius: 0.0,
            stationarity: f64::INFINITY,
            control_stagnation: f64::INFINITY,
            objective_stagnation: f64::INFINITY,
            norm_projected_gradient: f64::INFINITY,
            use_mean_norm: false,
            work: DVector::zeros(dim),
        })
    }

    /// Convenience constructor for the unconstrained case (±infinity box).
    pub fn unconstrained(initial_guess: &DVector<f64>) -> CoreResult<Self> {
        Self::new(BoundConstraints::unbounded(initial_guess.len()), initial_guess)
    }

    pub fn dim(&self) -> usize {
        self.current_control.len()
    }

    pub fn bounds(&self) -> &BoundConstraints {
        &self.bounds
    }

    pub fn control(&self) -> &DVector<f64> {
        &self.current_control
    }

    pub fn previous_control(&self) -> &DVector<f64> {
        &self.previous_control
    }

    pub fn set_control(&mut self, x: &DVector<f64>) {
        debug_assert_eq!(x.len(), self.current_control.len());
        self.current_control.copy_from(x);
    }

    pub fn gradient(&self) -> &DVector<f64> {
        &self.current_gradient
    }

    pub fn previous_gradient(&self) -> &DVector<f64> {
        &self.previous_gradient
    }

    pub fn set_gradient(&mut self, g: &DVector<f64>) {
        debug_assert_eq!(g.len(), self.current_gradient.len());
        self.current_gradient.copy_from(g);
    }

    pub fn objective(&self) -> f64 {
        self.current_objective
    }

    pub fn previous_objective(&self) -> f64 {
        self.previous_objective
    }

    pub fn set_objective(&mut self, value: f64) {
        self.current_objective = value;
    }

    pub fn active_set(&self) -> &DVector<f64> {
        &self.active_set
    }

    pub fn inactive_set(&self) -> &DVector<f64> {
        &self.inactive_set
    }

    pub fn radius(&self) -> f64 {
        self.trust_region_radius
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.trust_region_radius = radius;
    }

    /// Switch the stationarity and projected-gradient measures to the mean
    /// norm variant (summed squares divided by length before the root).
    pub fn set_mean_norm(&mut self, use_mean: bool) {
        self.use_mean_norm = use_mean;
    }

    pub fn uses_mean_norm(&self) -> bool {
        self.use_mean_norm
    }

    /// Recompute the active/inactive sets from `P(x - g)` against the bounds.
    ///
    /// If the inactive set collapses to empty (every index pinned, which
    /// happens with degenerate equal bounds), it is forced back to fully
    /// inactive so the subproblem solver always has a subspace to work in.
    pub fn compute_active_and_inactive_sets(&mut self) {
        self.work.copy_from(&self.current_control);
        self.work -= &self.current_gradient;
        self.bounds.project(&mut self.work);
        self.bounds
            .compute_active_and_inactive(&self.work, &mut self.active_set, &mut self.inactive_set);

        if self.inactive_set.sum() == 0.0 {
            self.active_set.fill(0.0);
            self.inactive_set.fill(1.0);
        }
    }

    /// Stationarity measure `‖(P(x - g) - x) ⊙ inactive‖`.
    ///
    /// Zero exactly at a first-order (KKT) point of the bound-constrained
    /// problem. Caches and returns the value.
    pub fn compute_stationarity_measure(&mut self) -> f64 {
        self.work.copy_from(&self.current_control);
        self.work -= &self.current_gradient;
        self.bounds.project(&mut self.work);
        self.work -= &self.current_control;
        self.work.component_mul_assign(&self.inactive_set);
        self.stationarity = reduced_norm(&self.work, self.use_mean_norm);
        self.stationarity
    }

    /// Control stagnation `max_i |x_i^current - x_i^previous|`.
    pub fn compute_control_stagnation_measure(&mut self) -> f64 {
        self.control_stagnation = max_abs_diff(&self.current_control, &self.previous_control);
        self.control_stagnation
    }

    /// Objective stagnation `|f^current - f^previous|`.
    pub fn compute_objective_stagnation_measure(&mut self) -> f64 {
        self.objective_stagnation = (self.current_objective - self.previous_objective).abs();
        self.objective_stagnation
    }

    /// Norm of the gradient restricted to the inactive set.
    pub fn compute_norm_projected_gradient(&mut self) -> f64 {
        self.work.copy_from(&self.current_gradient);
        self.work.component_mul_assign(&self.inactive_set);
        self.norm_projected_gradient = reduced_norm(&self.work, self.use_mean_norm);
        self.norm_projected_gradient
    }

    pub fn stationarity_measure(&self) -> f64 {
        self.stationarity
    }

    pub fn control_stagnation_measure(&self) -> f64 {
        self.control_stagnation
    }

    pub fn objective_stagnation_measure(&self) -> f64 {
        self.objective_stagnation
    }

    pub fn norm_projected_gradient(&self) -> f64 {
        self.norm_projected_gradient
    }

    /// Copy current control, gradient, and objective into the previous slots.
    ///
    /// Called right before a trial point overwrites the current iterate.
    pub fn cache_current_stage_data(&mut self) {
        self.previous_control.copy_from(&self.current_control);
        self.previous_gradient.copy_from(&self.current_gradient);
        self.previous_objective = self.current_objective;
    }

    /// Restore current control, gradient, and objective from the previous
    /// slots. Used when a trial step is rejected.
    pub fn reset_current_stage_data_to_previous_stage_data(&mut self) {
        self.current_control.copy_from(&self.previous_control);
        self.current_gradient.copy_from(&self.previous_gradient);
        self.current_objective = self.previous_objective;
    }
}
