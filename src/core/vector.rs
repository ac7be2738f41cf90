//! Scalar reductions over control vectors
//!
//! The trust-region measures need two norm variants and a component-wise
//! maximum difference. Everything else comes straight from nalgebra.

use nalgebra::DVector;

/// Mean norm: `sqrt(sum(x_i^2) / n)`.
///
/// Divides the summed squares by the vector length before taking the square
/// root, so the measure stays comparable across control-space resolutions.
/// Returns zero for an empty vector.
pub fn mean_norm(x: &DVector<f64>) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    (x.norm_squared() / x.len() as f64).sqrt()
}

/// Euclidean or mean norm, selected by `use_mean`.
pub fn reduced_norm(x: &DVector<f64>, use_mean: bool) -> f64 {
    if use_mean {
        mean_norm(x)
    } else {
        x.norm()
    }
}

/// Component-wise maximum absolute difference: `max_i |a_i - b_i|`.
///
/// Both vectors must have the same length.
pub fn max_abs_diff(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
