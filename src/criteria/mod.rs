//! Analytic test criteria
//!
//! Small closed-form criteria with exact gradients and Hessian-vector
//! products, used by the demos, the benchmark binary, and the test suite.
//! They double as reference implementations of the [`Criterion`] contract.

use nalgebra::{dvector, DVector};

use crate::core::{CoreResult, Criterion};

/// Offset elliptic paraboloid `f(x) = (x0 - 1)^2 + 2 (x1 - 2)^2`.
///
/// Unconstrained minimum at `(1, 2)` with value 0. Convex, so every solver
/// configuration should reach the minimizer.
#[derive(Debug, Clone, Default)]
pub struct Circle;

impl Criterion for Circle {
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
        Ok((x[0] - 1.0).powi(2) + 2.0 * (x[1] - 2.0).powi(2))
    }

    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
        Ok(dvector![2.0 * (x[0] - 1.0), 4.0 * (x[1] - 2.0)])
    }

    fn hessian_vector(
        &mut self,
        _x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        Ok(Some(dvector![2.0 * direction[0], 4.0 * direction[1]]))
    }
}

/// Two-dimensional Rosenbrock function
/// `f(x) = 100 (x1 - x0^2)^2 + (1 - x0)^2`.
///
/// Global minimum at `(1, 1)`. The curved valley makes it a standard
/// stress test for trust-region radius adaptation.
#[derive(Debug, Clone, Default)]
pub struct Rosenbrock;

impl Criterion for Rosenbrock {
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
        Ok(100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2))
    }

    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
        let t = x[1] - x[0] * x[0];
        Ok(dvector![
            -400.0 * x[0] * t - 2.0 * (1.0 - x[0]),
            200.0 * t
        ])
    }

    fn hessian_vector(
        &mut self,
        x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        let h00 = 1200.0 * x[0] * x[0] - 400.0 * x[1] + 2.0;
        let h01 = -400.0 * x[0];
        Ok(Some(dvector![
            h00 * direction[0] + h01 * direction[1],
            h01 * direction[0] + 200.0 * direction[1]
        ]))
    }
}

/// Disc constraint `c(x) = x0^2 + x1^2 - limit^2 <= 0`.
///
/// Keeps the control inside a circle of the given radius; pairs with
/// [`Circle`] or [`Rosenbrock`] as the constraint in augmented-Lagrangian
/// runs.
#[derive(Debug, Clone)]
pub struct Radius {
    limit: f64,
}

impl Radius {
    pub fn new(limit: f64) -> Self {
        Self { limit }
    }
}

impl Default for Radius {
    fn default() -> Self {
        Self { limit: 1.0 }
    }
}

impl Criterion for Radius {
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
        Ok(x[0] * x[0] + x[1] * x[1] - self.limit * self.limit)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
        Ok(dvector![2.0 * x[0], 2.0 * x[1]])
    }

    fn hessian_vector(
        &mut self,
        _x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        Ok(Some(direction.scale(2.0)))
    }
}
