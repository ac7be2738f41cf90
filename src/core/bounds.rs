//! Box constraints: projection and active-set computation
//!
//! Bounds are validated once at construction and immutable afterwards. The
//! projection clamps in place; the active-set computation classifies every
//! index as pinned at a bound (active) or free to move (inactive), using a
//! tolerance of machine epsilon scaled by the bound magnitude. An infinite
//! bound can never become active.

use nalgebra::DVector;

use crate::core::{CoreError, CoreResult};

/// Lower/upper box constraints on the control vector.
#[derive(Debug, Clone)]
pub struct BoundConstraints {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl BoundConstraints {
    /// Create validated bounds.
    ///
    /// Infinite entries are allowed (one-sided or absent bounds); NaN entries,
    /// mismatched lengths, empty vectors, and `lower_i > upper_i` are rejected.
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> CoreResult<Self> {
        if lower.len() != upper.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "lower bound has {} entries, upper bound has {}",
                lower.len(),
                upper.len()
            )));
        }
        if lower.is_empty() {
            return Err(CoreError::Bounds("bound vectors are empty".to_string()));
        }
        for i in 0..lower.len() {
            let (l, u) = (lower[i], upper[i]);
            if l.is_nan() || u.is_nan() {
                return Err(CoreError::Bounds(format!("NaN bound at index {i}")));
            }
            if l > u {
                return Err(CoreError::Bounds(format!(
                    "lower bound {l} exceeds upper bound {u} at index {i}"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// The ±infinity box: every index unconstrained.
    ///
    /// Used for unconstrained sub-cases, e.g. the augmented Lagrangian's
    /// relaxation of a problem without box constraints.
    pub fn unbounded(dim: usize) -> Self {
        Self {
            lower: DVector::from_element(dim, f64::NEG_INFINITY),
            upper: DVector::from_element(dim, f64::INFINITY),
        }
    }

    /// Number of control indices covered by these bounds.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// Clamp every entry of `x` into `[lower_i, upper_i]` in place.
    pub fn project(&self, x: &mut DVector<f64>) {
        debug_assert_eq!(x.len(), self.lower.len());
        for i in 0..x.len() {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    /// Classify each index of `x` as active (1) or inactive (0).
    ///
    /// Index i is active when `x_i` sits at or beyond either bound within
    /// `f64::EPSILON * |bound_i|`. Writes the complementary 0/1 masks into
    /// `active` and `inactive`, so `active[i] + inactive[i] == 1` always
    /// holds afterwards.
    pub fn compute_active_and_inactive(
        &self,
        x: &DVector<f64>,
        active: &mut DVector<f64>,
        inactive: &mut DVector<f64>,
    ) {
        debug_assert_eq!(x.len(), self.lower.len());
        debug_assert_eq!(active.len(), x.len());
        debug_assert_eq!(inactive.len(), x.len());
        for i in 0..x.len() {
            let (l, u) = (self.lower[i], self.upper[i]);
            let at_lower = l.is_finite() && x[i] <= l + f64::EPSILON * l.abs();
            let at_upper = u.is_finite() && x[i] >= u - f64::EPSILON * u.abs();
            if at_lower || at_upper {
                active[i] = 1.0;
                inactive[i] = 0.0;
            } else {
                active[i] = 0.0;
                inactive[i] = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_rejects_mismatched_lengths() {
        let result = BoundConstraints::new(dvector![0.0, 0.0], dvector![1.0]);
        assert!(matches!(result, Err(CoreError::DimensionMismatch(_))));
    }

    #[test]
    fn test_rejects_crossed_bounds() {
        let result = BoundConstraints::new(dvector![2.0], dvector![1.0]);
        assert!(matches!(result, Err(CoreError::Bounds(_))));
    }

    #[test]
    fn test_rejects_nan_bounds() {
        let result = BoundConstraints::new(dvector![f64::NAN], dvector![1.0]);
        assert!(matches!(result, Err(CoreError::Bounds(_))));
    }

    #[test]
    fn test_rejects_empty_bounds() {
        let result = BoundConstraints::new(DVector::zeros(0), DVector::zeros(0));
        assert!(matches!(result, Err(CoreError::Bounds(_))));
    }

    #[test]
    fn test_project_clamps_in_place() {
        let bounds = BoundConstraints::new(dvector![0.0, -1.0], dvector![1.0, 1.0]).unwrap();
        let mut x = dvector![-0.5, 2.0];
        bounds.project(&mut x);
        assert_eq!(x, dvector![0.0, 1.0]);
    }

    #[test]
    fn test_project_leaves_interior_points() {
        let bounds = BoundConstraints::new(dvector![0.0, -1.0], dvector![1.0, 1.0]).unwrap();
        let mut x = dvector![0.5, 0.0];
        bounds.project(&mut x);
        assert_eq!(x, dvector![0.5, 0.0]);
    }

    #[test]
    fn test_active_set_at_bounds() {
        let bounds = BoundConstraints::new(dvector![0.0, -1.0, 0.0], dvector![1.0, 1.0, 10.0]).unwrap();
        let x = dvector![0.0, 1.0, 5.0];
        let mut active = DVector::zeros(3);
        let mut inactive = DVector::zeros(3);
        bounds.compute_active_and_inactive(&x, &mut active, &mut inactive);
        assert_eq!(active, dvector![1.0, 1.0, 0.0]);
        assert_eq!(inactive, dvector![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_active_set_partition_invariant() {
        let bounds = BoundConstraints::new(dvector![0.0, 0.0, 0.0], dvector![1.0, 1.0, 1.0]).unwrap();
        let x = dvector![0.0, 0.3, 1.0];
        let mut active = DVector::zeros(3);
        let mut inactive = DVector::zeros(3);
        bounds.compute_active_and_inactive(&x, &mut active, &mut inactive);
        for i in 0..3 {
            assert_eq!(active[i] + inactive[i], 1.0);
        }
    }

    #[test]
    fn test_infinite_bounds_never_active() {
        let bounds = BoundConstraints::unbounded(2);
        let x = dvector![1e300, -1e300];
        let mut active = DVector::zeros(2);
        let mut inactive = DVector::zeros(2);
        bounds.compute_active_and_inactive(&x, &mut active, &mut inactive);
        assert_eq!(active, dvector![0.0, 0.0]);
        assert_eq!(inactive, dvector![1.0, 1.0]);
    }

    #[test]
    fn test_one_sided_bound() {
        let bounds = BoundConstraints::new(dvector![0.0], dvector![f64::INFINITY]).unwrap();
        let x = dvector![0.0];
        let mut active = DVector::zeros(1);
        let mut inactive = DVector::zeros(1);
        bounds.compute_active_and_inactive(&x, &mut active, &mut inactive);
        assert_eq!(active[0], 1.0);

        let x = dvector![1e12];
        bounds.compute_active_and_inactive(&x, &mut active, &mut inactive);
        assert_eq!(active[0], 0.0);
    }
}
