use crate::covariance_models::{
    CovarianceModel, ParGrad, Periodic, ScalarFormula, SquaredExponential,
};
use crate::errors::{KernelError, Result};
use crate::parameters::{ParamSource, Params};
use linfa::Float;
use log::debug;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix1, Ix2};
use std::fmt;
use std::sync::Arc;

/// A named covariance family bound to a hyperparameter source.
///
/// A kernel evaluates covariance matrices over coordinate sets given as
/// `(n, dim)` arrays, and, when the family carries the capability, the
/// analytic gradient of the covariance with respect to the hyperparameters.
/// Kernel identity is immutable after construction; only the values behind a
/// shared parameter source may change between evaluations, and they are
/// re-read on every call.
#[derive(Clone)]
pub struct Kernel<F: Float> {
    model: Arc<dyn CovarianceModel<F>>,
    kpar: Params<F>,
}

impl<F: Float> fmt::Debug for Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("model", &self.model.name())
            .field("dim", &self.model.dim())
            .field("kpar", &self.kpar)
            .finish()
    }
}

impl<F: Float> fmt::Display for Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.model)
    }
}

impl<F: Float> Kernel<F> {
    /// A kernel from any covariance model and hyperparameter source.
    /// The current hyperparameter length is checked against the model.
    pub fn new(
        model: Arc<dyn CovarianceModel<F>>,
        kpar: impl Into<Params<F>>,
    ) -> Result<Kernel<F>> {
        let kernel = Kernel {
            model,
            kpar: kpar.into(),
        };
        kernel.check_params_len(kernel.kpar.value().len())?;
        Ok(kernel)
    }

    /// A squared exponential kernel over `dim`-dimensional inputs with unit
    /// hyperparameters `[p0, p1, ..., p_dim]` (amplitude then one scale per
    /// input dimension): k(x, x') = p0 * exp(-sum_d p_d (x_d - x'_d)^2).
    ///
    /// Carries the analytic parameter gradient.
    ///
    /// *Panics* if `dim` is zero.
    pub fn squared_exponential(dim: usize) -> Kernel<F> {
        Kernel {
            model: Arc::new(SquaredExponential::new(dim)),
            kpar: Params::Fixed(Array1::ones(dim + 1)),
        }
    }

    /// A squared exponential kernel with explicit hyperparameters
    pub fn squared_exponential_with(kpar: Array1<F>, dim: usize) -> Result<Kernel<F>> {
        Kernel::new(Arc::new(SquaredExponential::new(dim)), kpar)
    }

    /// A 1-dimensional periodic kernel with unit hyperparameters
    /// `[amplitude, length scale, period]`:
    /// k(x, x') = p0^2 * exp(-2 sin(pi |x - x'| / p2) / p1^2).
    ///
    /// Carries no parameter gradient: gradient requests yield `Ok(None)`.
    pub fn periodic() -> Kernel<F> {
        Kernel {
            model: Arc::new(Periodic()),
            kpar: Params::Fixed(Array1::ones(3)),
        }
    }

    /// A periodic kernel with explicit hyperparameters
    pub fn periodic_with(kpar: Array1<F>) -> Result<Kernel<F>> {
        Kernel::new(Arc::new(Periodic()), kpar)
    }

    /// A kernel from a scalar covariance formula `f(x, x', kpar)` evaluated
    /// over every pair of locations, without a specialized matrix evaluator.
    pub fn from_fn(
        name: impl Into<String>,
        dim: usize,
        kpar: Array1<F>,
        f: impl Fn(ArrayView1<F>, ArrayView1<F>, ArrayView1<F>) -> F + Send + Sync + 'static,
    ) -> Result<Kernel<F>> {
        let n_params = kpar.len();
        Kernel::new(Arc::new(ScalarFormula::new(name, dim, n_params, f)), kpar)
    }

    /// Replace the hyperparameter handle with an externally owned store,
    /// read anew on every evaluation.
    pub fn with_param_source(mut self, source: Arc<dyn ParamSource<F>>) -> Kernel<F> {
        self.kpar = Params::Shared(source);
        self
    }

    /// Family name
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Input dimensionality
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Number of hyperparameters the family expects
    pub fn n_params(&self) -> usize {
        self.model.n_params()
    }

    /// The currently resolved hyperparameter vector
    pub fn params(&self) -> Array1<F> {
        self.kpar.value()
    }

    pub(crate) fn model(&self) -> &dyn CovarianceModel<F> {
        self.model.as_ref()
    }

    pub(crate) fn check_inputs(&self, x1_cols: usize, x2_cols: usize) -> Result<()> {
        let dim = self.dim();
        if x1_cols != dim || x2_cols != dim {
            return Err(KernelError::DimensionMismatchError(format!(
                "{} kernel expects {}-dimensional locations, got x1 with {} and x2 with {} columns",
                self.name(),
                dim,
                x1_cols,
                x2_cols
            )));
        }
        Ok(())
    }

    pub(crate) fn check_params_len(&self, len: usize) -> Result<()> {
        let expected = self.n_params();
        if len != expected {
            return Err(KernelError::HyperparameterError(format!(
                "{} kernel expects {} hyperparameters, got {}",
                self.name(),
                expected,
                len
            )));
        }
        Ok(())
    }

    /// Covariance matrix between two coordinate sets, of shape
    /// (nrows(x1), nrows(x2)), using the hyperparameters currently resolved
    /// from the kernel's source.
    pub fn cov(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        let kpar = self.kpar.value();
        self.cov_with_params(x1, x2, &kpar)
    }

    /// Self covariance (Gram matrix) of a coordinate set, the `x2`-omitted
    /// case: equals `cov(x, x)`.
    pub fn gram(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.cov(x, x)
    }

    /// Covariance with an explicit hyperparameter vector overriding the
    /// kernel's own source for this evaluation only.
    pub fn cov_with_params(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
        kpar: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array2<F>> {
        self.check_inputs(x1.ncols(), x2.ncols())?;
        self.check_params_len(kpar.len())?;
        Ok(self.model.value(x1.view(), x2.view(), kpar.view()))
    }

    /// Partial derivatives of the covariance matrix with respect to the
    /// hyperparameters, evaluated at `kpar`: `ind = None` yields
    /// [`ParGrad::All`], one matrix per hyperparameter in order;
    /// `ind = Some(k)` yields [`ParGrad::Single`] for hyperparameter `k`.
    ///
    /// `Ok(None)` exactly when the family carries no gradient capability;
    /// callers must branch on it rather than assume a gradient exists.
    /// Malformed inputs surface as errors, never as `None`.
    pub fn cov_par_grad(
        &self,
        kpar: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
        ind: Option<usize>,
    ) -> Result<Option<ParGrad<F>>> {
        self.check_inputs(x1.ncols(), x2.ncols())?;
        self.check_params_len(kpar.len())?;
        if let Some(k) = ind {
            if k >= self.n_params() {
                return Err(KernelError::InvalidValueError(format!(
                    "gradient index {} out of range for {} kernel with {} hyperparameters",
                    k,
                    self.name(),
                    self.n_params()
                )));
            }
        }
        match self
            .model
            .param_gradient(x1.view(), x2.view(), kpar.view(), ind)
        {
            Some(grad) => Ok(Some(grad)),
            None => {
                debug!("{} kernel carries no parameter gradient", self.name());
                Ok(None)
            }
        }
    }

    /// The `x2`-omitted form of [`cov_par_grad`](Kernel::cov_par_grad)
    pub fn gram_par_grad(
        &self,
        kpar: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        ind: Option<usize>,
    ) -> Result<Option<ParGrad<F>>> {
        self.cov_par_grad(kpar, x, x, ind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::SharedParams;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};
    use paste::paste;
    use std::sync::Arc;

    macro_rules! test_shape_law {
        ($name:ident, $kernel:expr, $dim:expr) => {
            paste! {
                #[test]
                fn [<test_ $name _shape_law>]() {
                    let kernel: Kernel<f64> = $kernel;
                    let x1 = Array1::linspace(0., 1., 4 * $dim)
                        .into_shape_with_order((4, $dim))
                        .unwrap();
                    let x2 = Array1::linspace(-1., 2., 7 * $dim)
                        .into_shape_with_order((7, $dim))
                        .unwrap();
                    assert_eq!(kernel.cov(&x1, &x2).unwrap().dim(), (4, 7));
                    assert_eq!(kernel.gram(&x1).unwrap().dim(), (4, 4));
                    assert_abs_diff_eq!(
                        kernel.gram(&x1).unwrap(),
                        kernel.cov(&x1, &x1).unwrap(),
                        epsilon = 1e-12
                    );
                }
            }
        };
    }

    test_shape_law!(squared_exponential, Kernel::squared_exponential(1), 1);
    test_shape_law!(squared_exponential_2d, Kernel::squared_exponential(2), 2);
    test_shape_law!(periodic, Kernel::periodic(), 1);

    #[test]
    fn test_squared_exponential_gram() {
        let kernel = Kernel::squared_exponential_with(array![1.0, 1.0], 1).unwrap();
        let k = kernel.gram(&array![[0.0], [1.0]]).unwrap();
        let expected = array![[1.0, f64::exp(-1.)], [f64::exp(-1.), 1.0]];
        assert_abs_diff_eq!(k, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_squared_exponential_gram_is_psd() {
        let kernel = Kernel::squared_exponential_with(array![1.3, 0.4, 2.1], 2).unwrap();
        let x = array![[0., 0.], [0.5, 1.], [1., 0.2], [2., 2.], [3., 0.9]];
        let k = kernel.gram(&x).unwrap();
        assert_abs_diff_eq!(k.clone(), k.t().to_owned(), epsilon = 1e-12);
        for z in [
            array![1., -1., 1., -1., 1.],
            array![0.3, 0., 2., -0.7, 0.1],
            array![1., 1., 1., 1., 1.],
        ] {
            let quad = z.dot(&k.dot(&z));
            assert!(quad >= -1e-10, "quadratic form {quad} is negative");
        }
    }

    #[test]
    fn test_periodic_gram_diagonal() {
        let kernel = Kernel::periodic_with(array![1.4, 0.8, 2.0]).unwrap();
        let x = array![[0.], [0.77], [1.3], [5.2]];
        let k = kernel.gram(&x).unwrap();
        for i in 0..x.nrows() {
            assert_abs_diff_eq!(k[[i, i]], 1.4 * 1.4, epsilon = 1e-12);
        }
        // default parameters put exactly 1 on the diagonal
        let k = Kernel::<f64>::periodic().gram(&x).unwrap();
        for i in 0..x.nrows() {
            assert_abs_diff_eq!(k[[i, i]], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_par_grad_finite_differences() {
        let x1 = array![[0.1, 1.0], [0.4, 0.2], [1.3, 0.7]];
        let x2 = array![[0.0, 0.5], [0.9, 1.1]];
        let kpar = array![1.2, 0.8, 0.5];
        let kernel = Kernel::squared_exponential_with(kpar.clone(), 2).unwrap();
        let grads = kernel
            .cov_par_grad(&kpar, &x1, &x2, None)
            .unwrap()
            .unwrap()
            .into_all()
            .unwrap();
        assert_eq!(grads.len(), 3);

        let e = 1e-6;
        for d in 0..3 {
            let mut up = kpar.clone();
            up[d] += e;
            let mut down = kpar.clone();
            down[d] -= e;
            let fdiff = (kernel.cov_with_params(&x1, &x2, &up).unwrap()
                - kernel.cov_with_params(&x1, &x2, &down).unwrap())
            .mapv(|v| v / (2. * e));
            assert_abs_diff_eq!(fdiff, grads[d], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_par_grad_single_matches_full() {
        let x = array![[0.], [0.6], [1.7]];
        let kpar = array![2.0, 0.3];
        let kernel = Kernel::squared_exponential_with(kpar.clone(), 1).unwrap();
        let full = kernel
            .gram_par_grad(&kpar, &x, None)
            .unwrap()
            .unwrap()
            .into_all()
            .unwrap();
        for d in 0..2 {
            let single = kernel
                .gram_par_grad(&kpar, &x, Some(d))
                .unwrap()
                .unwrap()
                .into_single()
                .unwrap();
            assert_abs_diff_eq!(single, full[d], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_periodic_par_grad_degrades() {
        let x = array![[0.], [1.]];
        let kpar = array![1., 1., 1.];
        let kernel = Kernel::<f64>::periodic();
        let grad = kernel.gram_par_grad(&kpar, &x, None).unwrap();
        assert!(grad.is_none());
        // degraded, not an error, and still validated
        assert!(kernel.gram_par_grad(&array![1.], &x, None).is_err());
    }

    #[test]
    fn test_param_override() {
        let kernel = Kernel::squared_exponential_with(array![1.0, 1.0], 1).unwrap();
        let x = array![[0.], [2.]];
        let k = kernel.cov_with_params(&x, &x, &array![3.0, 1.0]).unwrap();
        assert_abs_diff_eq!(k[[0, 0]], 3.0, epsilon = 1e-12);
        // the kernel's own parameters are untouched
        assert_abs_diff_eq!(kernel.gram(&x).unwrap()[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shared_params_reread_between_calls() {
        let store = SharedParams::new(array![1.0, 1.0]);
        let kernel =
            Kernel::squared_exponential(1).with_param_source(Arc::new(store.clone()));
        let x = array![[0.], [1.]];
        assert_abs_diff_eq!(kernel.gram(&x).unwrap()[[0, 0]], 1.0, epsilon = 1e-12);
        store.set(array![2.5, 1.0]);
        assert_abs_diff_eq!(kernel.gram(&x).unwrap()[[0, 0]], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_input_validation() {
        let kernel = Kernel::<f64>::squared_exponential(2);
        let x3 = array![[0., 0., 0.]];
        assert!(matches!(
            kernel.gram(&x3),
            Err(KernelError::DimensionMismatchError(_))
        ));
        assert!(matches!(
            Kernel::squared_exponential_with(array![1., 1.], 2),
            Err(KernelError::HyperparameterError(_))
        ));
        let x = array![[0., 0.]];
        assert!(matches!(
            kernel.cov_par_grad(&array![1., 1., 1.], &x, &x, Some(5)),
            Err(KernelError::InvalidValueError(_))
        ));
    }

    #[test]
    fn test_from_fn_outer_grid() {
        let kernel = Kernel::from_fn("Linear", 1, array![2.0], |x1, x2, kpar| {
            kpar[0] * x1[0] * x2[0]
        })
        .unwrap();
        let k = kernel.cov(&array![[1.], [2.]], &array![[3.]]).unwrap();
        assert_abs_diff_eq!(k, array![[6.], [12.]], epsilon = 1e-12);
        // no gradient wired through the generic path
        assert!(kernel
            .cov_par_grad(&array![2.0], &array![[1.]], &array![[1.]], None)
            .unwrap()
            .is_none());
    }
}
