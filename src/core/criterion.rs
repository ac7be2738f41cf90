//! Criterion trait: the evaluator contract consumed by the solvers
//!
//! A criterion supplies the scalar value and gradient of an objective or
//! constraint function, and optionally Hessian-vector products. Evaluators
//! can be arbitrarily expensive (e.g. a PDE solve per call); the solvers
//! treat every method as a blocking synchronous operation and never call a
//! given instance concurrently, which the `&mut self` receivers encode.

use nalgebra::DVector;

use crate::core::CoreResult;

/// Scalar criterion over a control vector.
///
/// Implementations must be deterministic for a fixed control vector. Failure
/// is signaled through the returned `CoreResult` and propagates uncaught
/// through the solvers; the optimization state is left as-is and must be
/// discarded by the caller.
///
/// # Example
///
/// ```
/// use nalgebra::{dvector, DVector};
/// use summit_solver::core::{CoreResult, Criterion};
///
/// /// f(x) = (x0 - 1)^2 + (x1 + 2)^2
/// struct Shifted;
///
/// impl Criterion for Shifted {
///     fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64> {
///         Ok((x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2))
///     }
///
///     fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>> {
///         Ok(dvector![2.0 * (x[0] - 1.0), 2.0 * (x[1] + 2.0)])
///     }
/// }
/// ```
pub trait Criterion {
    /// Evaluate the criterion at `x`.
    fn value(&mut self, x: &DVector<f64>) -> CoreResult<f64>;

    /// Evaluate the gradient at `x`. Same length as `x`.
    fn gradient(&mut self, x: &DVector<f64>) -> CoreResult<DVector<f64>>;

    /// Apply the Hessian at `x` to `direction`.
    ///
    /// Returns `Ok(None)` when the evaluator does not supply second-order
    /// information; the solver then falls back according to its configured
    /// Hessian method.
    fn hessian_vector(
        &mut self,
        x: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> CoreResult<Option<DVector<f64>>> {
        let _ = (x, direction);
        Ok(None)
    }

    /// Called once after a trial point has been accepted as the new iterate.
    ///
    /// Evaluators backed by expensive simulations use this to promote
    /// trial-point results into their internal caches.
    fn cache_data(&mut self) {}
}
