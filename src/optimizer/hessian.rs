//! Hessian application strategies for the trust-region model.
//!
//! The quadratic model needs H·v products only, never an assembled matrix.
//! Three strategies are supported: the criterion's analytic operator, a
//! limited-memory BFGS approximation built from accepted steps, and the
//! identity (Hessian disabled), which turns the first CG iteration into a
//! projected steepest-descent step.

use nalgebra::DVector;
use std::collections::VecDeque;
use std::fmt;

use crate::core::Criterion;
use crate::optimizer::{OptimizerError, OptimizerResult};

/// How the trust-region model applies its Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HessianMethod {
    /// Identity Hessian: the subproblem reduces to a projected
    /// steepest-descent (Cauchy) step.
    None,
    /// Limited-memory BFGS approximation assembled from accepted
    /// step/gradient-difference pairs.
    Lbfgs,
    /// Exact Hessian-vector products from `Criterion::hessian_vector`.
    #[default]
    Analytical,
}

impl fmt::Display for HessianMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HessianMethod::None => write!(f, "none"),
            HessianMethod::Lbfgs => write!(f, "lbfgs"),
            HessianMethod::Analytical => write!(f, "analytical"),
        }
    }
}

/// Limited-memory BFGS approximation of the Hessian in product form.
///
/// Stores up to `memory` step/gradient-difference pairs `(s_i, y_i)` and
/// applies the direct (non-inverse) BFGS matrix
/// `B_{i+1} = B_i - (B_i s_i s_i' B_i)/(s_i' B_i s_i) + (y_i y_i')/(y_i' s_i)`
/// seeded with `B_0 = gamma I`, `gamma = (y'y)/(y's)` of the newest pair.
/// The basis vectors `a_i = B_i s_i` are rebuilt after every update, so an
/// application costs O(memory · n).
#[derive(Debug, Clone)]
pub struct LbfgsHessian {
    memory: usize,
    s: VecDeque<DVector<f64>>,
    y: VecDeque<DVector<f64>>,
    basis: Vec<DVector<f64>>,
    ys: Vec<f64>,
    sa: Vec<f64>,
    gamma: f64,
}

impl LbfgsHessian {
    pub fn new(memory: usize) -> Self {
        Self {
            memory: memory.max(1),
            s: VecDeque::new(),
            y: VecDeque::new(),
            basis: Vec::new(),
            ys: Vec::new(),
            sa: Vec::new(),
            gamma: 1.0,
        }
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    /// Discard all stored pairs.
    pub fn reset(&mut self) {
        self.s.clear();
        self.y.clear();
        self.basis.clear();
        self.ys.clear();
        self.sa.clear();
        self.gamma = 1.0;
    }

    /// Store a step/gradient-difference pair and rebuild the basis.
    ///
    /// Pairs without sufficient positive curvature (`y's <= 1e-8 ‖s‖‖y‖`)
    /// would break positive definiteness and are skipped; returns whether the
    /// pair was stored. The oldest pair is evicted once `memory` is full.
    pub fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) -> bool {
        let ys = y.dot(s);
        if !ys.is_finite() || ys <= 1e-8 * s.norm() * y.norm() {
            return false;
        }
        if self.s.len() == self.memory {
            self.s.pop_front();
            self.y.pop_front();
        }
        self.s.push_back(s.clone());
        self.y.push_back(y.clone());
        self.rebuild();
        true
    }

    /// Apply the approximation: `B v`. Identity while no pairs are stored.
    pub fn apply(&self, v: &DVector<f64>) -> DVector<f64> {
        if self.is_empty() {
            return v.clone();
        }
        let mut result = v.scale(self.gamma);
        for i in 0..self.s.len() {
            let yv = self.y[i].dot(v) / self.ys[i];
            let av = self.basis[i].dot(v) / self.sa[i];
            result.axpy(yv, &self.y[i], 1.0);
            result.axpy(-av, &self.basis[i], 1.0);
        }
        result
    }

    fn rebuild(&mut self) {
        let m = self.s.len();
        let last = m - 1;
        self.gamma = self.y[last].norm_squared() / self.y[last].dot(&self.s[last]);
        self.basis.clear();
        self.ys.clear();
        self.sa.clear();
        for i in 0..m {
            // a_i = B_i s_i, built from the updates already in the basis.
            let mut a = self.s[i].scale(self.gamma);
            for j in 0..i {
                let yj_si = self.y[j].dot(&self.s[i]) / self.ys[j];
                let aj_si = self.basis[j].dot(&self.s[i]) / self.sa[j];
                a.axpy(yj_si, &self.y[j], 1.0);
                a.axpy(-aj_si, &self.basis[j], 1.0);
            }
            let sa = self.s[i].dot(&a);
            debug_assert!(sa > 0.0, "curvature guard should keep s'Bs positive");
            self.ys.push(self.y[i].dot(&self.s[i]));
            self.sa.push(sa);
            self.basis.push(a);
        }
    }
}

/// Dispatches Hessian-vector products according to the configured method.
pub(crate) struct HessianOperator {
    method: HessianMethod,
    lbfgs: LbfgsHessian,
}

impl HessianOperator {
    pub(crate) fn new(method: HessianMethod, limited_memory_storage: usize) -> Self {
        Self {
            method,
            lbfgs: LbfgsHessian::new(limited_memory_storage),
        }
    }

    /// Feed an accepted step/gradient-difference pair to the approximation.
    /// No-op unless the method is `Lbfgs`; returns whether a pair was stored.
    pub(crate) fn update_pair(&mut self, s: &DVector<f64>, y: &DVector<f64>) -> bool {
        match self.method {
            HessianMethod::Lbfgs => self.lbfgs.update(s, y),
            _ => false,
        }
    }

    /// Apply the Hessian at `x` to `v`.
    pub(crate) fn apply<C: Criterion + ?Sized>(
        &self,
        criterion: &mut C,
        x: &DVector<f64>,
        v: &DVector<f64>,
    ) -> OptimizerResult<DVector<f64>> {
        match self.method {
            HessianMethod::None => Ok(v.clone()),
            HessianMethod::Lbfgs => Ok(self.lbfgs.apply(v)),
            HessianMethod::Analytical => criterion
                .hessian_vector(x, v)?
                .ok_or(OptimizerError::HessianUnavailable),
        }
    }
}
