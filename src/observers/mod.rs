//! Observer pattern for optimization monitoring.
//!
//! Observers can be registered with any solver and are notified after each
//! iteration, enabling metrics collection, convergence tracing, and custom
//! analysis without coupling the algorithms to any reporting backend. When no
//! observers are registered, notification is a no-op.

use nalgebra::DVector;

/// Observer notified after each optimization iteration.
///
/// Observers receive the currently committed control vector and the
/// iteration number; on a rejected trial step the control is unchanged from
/// the previous iteration. Keep implementations lightweight; handle errors
/// internally rather than panicking. Observers must be `Send`; use interior
/// mutability (`Mutex`) to accumulate state.
pub trait OptObserver: Send {
    /// Called after each iteration with the committed iterate.
    ///
    /// `iteration` counts outer iterations, starting at 1.
    fn on_step(&self, control: &DVector<f64>, iteration: usize);

    /// Optional per-iteration metrics, delivered before `on_step`.
    ///
    /// # Arguments
    /// * `objective` - objective value at the committed iterate
    /// * `stationarity` - projected-gradient stationarity measure
    /// * `radius` - trust-region radius after the update
    /// * `step_norm` - norm of the accepted step
    /// * `step_quality` - actual-over-predicted reduction ratio, when defined
    fn set_iteration_metrics(
        &self,
        _objective: f64,
        _stationarity: f64,
        _radius: f64,
        _step_norm: f64,
        _step_quality: Option<f64>,
    ) {
    }
}

/// Collection of observers owned by a solver.
///
/// Solvers expose `add_observer()`, which forwards here; `notify()` fans a
/// committed iterate out to every registered observer in insertion order.
#[derive(Default)]
pub struct OptObserverVec {
    observers: Vec<Box<dyn OptObserver>>,
}

impl OptObserverVec {
    /// Create a new empty observer collection.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Add an observer. It will be called in the order it was added.
    pub fn add(&mut self, observer: impl OptObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Forward metrics to all observers.
    #[inline]
    pub fn set_iteration_metrics(
        &self,
        objective: f64,
        stationarity: f64,
        radius: f64,
        step_norm: f64,
        step_quality: Option<f64>,
    ) {
        for observer in &self.observers {
            observer.set_iteration_metrics(objective, stationarity, radius, step_norm, step_quality);
        }
    }

    /// Notify all observers of a committed iterate.
    #[inline]
    pub fn notify(&self, control: &DVector<f64>, iteration: usize) {
        for observer in &self.observers {
            observer.on_step(control, iteration);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingObserver {
        calls: Arc<AtomicUsize>,
    }

    impl OptObserver for CountingObserver {
        fn on_step(&self, _control: &DVector<f64>, _iteration: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_all_observers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = OptObserverVec::new();
        observers.add(CountingObserver {
            calls: Arc::clone(&calls),
        });
        observers.add(CountingObserver {
            calls: Arc::clone(&calls),
        });
        assert_eq!(observers.len(), 2);

        let x = dvector![1.0, 2.0];
        observers.notify(&x, 1);
        observers.notify(&x, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_empty_vec_is_noop() {
        let observers = OptObserverVec::new();
        assert!(observers.is_empty());
        observers.notify(&dvector![0.0], 1);
        observers.set_iteration_metrics(0.0, 0.0, 1.0, 0.0, None);
    }
}
