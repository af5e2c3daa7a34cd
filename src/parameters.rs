use linfa::Float;
use ndarray::Array1;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A source of hyperparameter values for a kernel.
///
/// A kernel never writes through its source; it re-reads
/// [`current_value`](ParamSource::current_value) on every evaluation, so an
/// externally owned store may be mutated between calls.
pub trait ParamSource<F: Float>: Send + Sync {
    /// The current hyperparameter vector
    fn current_value(&self) -> Array1<F>;
}

/// Where the hyperparameters of a kernel live.
#[derive(Clone)]
pub enum Params<F: Float> {
    /// A vector owned by the kernel itself
    Fixed(Array1<F>),
    /// Values read at evaluation time from an externally owned store
    Shared(Arc<dyn ParamSource<F>>),
}

impl<F: Float> Params<F> {
    /// Resolve the active hyperparameter vector.
    ///
    /// Shared stores are re-read on every call, never snapshotted.
    pub fn value(&self) -> Array1<F> {
        match self {
            Params::Fixed(values) => values.clone(),
            Params::Shared(source) => source.current_value(),
        }
    }
}

impl<F: Float> fmt::Debug for Params<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Params::Fixed(values) => f.debug_tuple("Fixed").field(values).finish(),
            Params::Shared(_) => f.debug_tuple("Shared").field(&"..").finish(),
        }
    }
}

impl<F: Float> From<Array1<F>> for Params<F> {
    fn from(values: Array1<F>) -> Self {
        Params::Fixed(values)
    }
}

impl<F: Float> From<SharedParams<F>> for Params<F> {
    fn from(store: SharedParams<F>) -> Self {
        Params::Shared(Arc::new(store))
    }
}

/// An externally owned mutable hyperparameter store.
///
/// Cloning shares the underlying storage: an optimizer keeps one clone and
/// updates it with [`set`](SharedParams::set) while kernels holding another
/// clone read the updated values on their next evaluation. Concurrent reads
/// are safe.
#[derive(Clone, Debug)]
pub struct SharedParams<F: Float>(Arc<RwLock<Array1<F>>>);

impl<F: Float> SharedParams<F> {
    /// A store holding the given initial values
    pub fn new(values: Array1<F>) -> SharedParams<F> {
        SharedParams(Arc::new(RwLock::new(values)))
    }

    /// Replace the stored vector; kernels see it on their next evaluation
    pub fn set(&self, values: Array1<F>) {
        *self.0.write().expect("hyperparameter store poisoned") = values;
    }

    /// A snapshot of the stored vector
    pub fn get(&self) -> Array1<F> {
        self.0.read().expect("hyperparameter store poisoned").clone()
    }
}

impl<F: Float> ParamSource<F> for SharedParams<F> {
    fn current_value(&self) -> Array1<F> {
        self.get()
    }
}
