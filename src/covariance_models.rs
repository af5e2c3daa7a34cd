//! A module for covariance models defining the kernel families.
//!
//! The following families are implemented:
//! * squared exponential,
//! * periodic.
//!
//! A covariance model carries its closed-form formula together with optional
//! analytic capabilities: the gradient of the covariance with respect to the
//! hyperparameters, and the derivative covariance (the covariance structure
//! induced on the partial derivatives of the process). A family either
//! carries a capability or it does not; the accessors return `None` in the
//! latter case and callers branch on it instead of treating it as a failure.

use crate::utils::pairwise_differences;
use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Zip};
use std::fmt;
use std::sync::Arc;

/// Partial derivatives of a covariance matrix with respect to hyperparameters.
#[derive(Debug, Clone)]
pub enum ParGrad<F: Float> {
    /// The derivative with respect to one selected hyperparameter
    Single(Array2<F>),
    /// The derivatives with respect to every hyperparameter, in parameter order
    All(Vec<Array2<F>>),
}

impl<F: Float> ParGrad<F> {
    /// The single requested partial, when one hyperparameter was selected
    pub fn into_single(self) -> Option<Array2<F>> {
        match self {
            ParGrad::Single(grad) => Some(grad),
            ParGrad::All(_) => None,
        }
    }

    /// All partials in hyperparameter order, when the full gradient was requested
    pub fn into_all(self) -> Option<Vec<Array2<F>>> {
        match self {
            ParGrad::Single(_) => None,
            ParGrad::All(grads) => Some(grads),
        }
    }
}

/// A trait for covariance models used by a [`Kernel`](crate::Kernel).
///
/// Implementations may assume their inputs are already validated by the
/// calling kernel: `x1` and `x2` have [`dim`](CovarianceModel::dim) columns,
/// `kpar` has [`n_params`](CovarianceModel::n_params) entries and a selected
/// gradient index is in range.
pub trait CovarianceModel<F: Float>: fmt::Display + Send + Sync {
    /// Family name used in error messages and logs
    fn name(&self) -> &str;

    /// Input dimensionality the formula expects
    fn dim(&self) -> usize;

    /// Number of free hyperparameters
    fn n_params(&self) -> usize;

    /// Covariance matrix of shape (nrows(x1), nrows(x2))
    fn value(&self, x1: ArrayView2<F>, x2: ArrayView2<F>, kpar: ArrayView1<F>) -> Array2<F>;

    /// Partial derivatives of [`value`](CovarianceModel::value) with respect
    /// to the hyperparameters: all of them for `ind = None`, a single one for
    /// `ind = Some(k)`. Returns `None` when the family carries no gradient.
    fn param_gradient(
        &self,
        x1: ArrayView2<F>,
        x2: ArrayView2<F>,
        kpar: ArrayView1<F>,
        ind: Option<usize>,
    ) -> Option<ParGrad<F>> {
        let _ = (x1, x2, kpar, ind);
        None
    }

    /// Covariance block between the process derivatives along input
    /// components `i` and `j`: cov(dY/dx_i(x1), dY/dx_j(x2)).
    /// Returns `None` when the family carries no derivative covariance.
    fn deriv_value(
        &self,
        x1: ArrayView2<F>,
        x2: ArrayView2<F>,
        kpar: ArrayView1<F>,
        i: usize,
        j: usize,
    ) -> Option<Array2<F>> {
        let _ = (x1, x2, kpar, i, j);
        None
    }
}

/// Squared exponential covariance model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SquaredExponential {
    dim: usize,
}

impl SquaredExponential {
    /// A squared exponential family over `dim`-dimensional inputs.
    /// Hyperparameters are `[p0, p1, ..., p_dim]`: amplitude then one
    /// inverse-squared-length-scale per input dimension.
    ///
    /// *Panics* if `dim` is zero.
    pub fn new(dim: usize) -> SquaredExponential {
        assert!(dim >= 1, "squared exponential requires at least one input dimension");
        SquaredExponential { dim }
    }

    /// -(x1_d - x2_d)^2 * k(x1, x2), the partial with respect to scale d
    fn scale_partial<F: Float>(
        &self,
        x1: &ArrayView2<F>,
        x2: &ArrayView2<F>,
        d: usize,
        k: &Array2<F>,
    ) -> Array2<F> {
        let sq = pairwise_differences(x1, x2)
            .column(d)
            .mapv(|v| -(v * v))
            .into_shape_with_order(k.dim())
            .unwrap();
        sq * k
    }
}

impl fmt::Display for SquaredExponential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SquaredExponential")
    }
}

impl<F: Float> CovarianceModel<F> for SquaredExponential {
    fn name(&self) -> &str {
        "SquaredExponential"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_params(&self) -> usize {
        self.dim + 1
    }

    /// ```text
    ///              dim
    /// k(x, x') = p_0 * exp( - sum p_d * (x_d - x'_d)^2 )
    ///              d=1
    /// ```
    fn value(&self, x1: ArrayView2<F>, x2: ArrayView2<F>, kpar: ArrayView1<F>) -> Array2<F> {
        let scales = kpar.slice(s![1..]);
        let r = pairwise_differences(&x1, &x2).mapv(|v| v * v).dot(&scales);
        r.mapv(|v| kpar[0] * F::exp(-v))
            .into_shape_with_order((x1.nrows(), x2.nrows()))
            .unwrap()
    }

    /// dk/dp_0 is the covariance formula with the amplitude replaced by one,
    /// dk/dp_d is -(x_d - x'_d)^2 * k(x, x') for d = 1..dim.
    fn param_gradient(
        &self,
        x1: ArrayView2<F>,
        x2: ArrayView2<F>,
        kpar: ArrayView1<F>,
        ind: Option<usize>,
    ) -> Option<ParGrad<F>> {
        let unit_amplitude = || {
            let mut unit = kpar.to_owned();
            unit[0] = F::one();
            unit
        };
        match ind {
            Some(0) => Some(ParGrad::Single(self.value(x1, x2, unit_amplitude().view()))),
            Some(p) => {
                let k = self.value(x1, x2, kpar);
                Some(ParGrad::Single(self.scale_partial(&x1, &x2, p - 1, &k)))
            }
            None => {
                let k = self.value(x1, x2, kpar);
                let mut grads = Vec::with_capacity(self.dim + 1);
                grads.push(self.value(x1, x2, unit_amplitude().view()));
                for d in 0..self.dim {
                    grads.push(self.scale_partial(&x1, &x2, d, &k));
                }
                Some(ParGrad::All(grads))
            }
        }
    }

    /// d2k/dx_i dx'_j = k(x, x') * (2 p_{i+1} delta_ij - 4 p_{i+1} p_{j+1} u_i u_j)
    /// with u = x - x' per location pair.
    fn deriv_value(
        &self,
        x1: ArrayView2<F>,
        x2: ArrayView2<F>,
        kpar: ArrayView1<F>,
        i: usize,
        j: usize,
    ) -> Option<Array2<F>> {
        let (m, n) = (x1.nrows(), x2.nrows());
        let k = self.value(x1, x2, kpar);
        let d = pairwise_differences(&x1, &x2);
        let (pi, pj) = (kpar[i + 1], kpar[j + 1]);
        let two = F::cast(2.);
        let four = F::cast(4.);

        let ui = d.column(i);
        let uj = d.column(j);
        let mut factor = Array1::<F>::zeros(m * n);
        Zip::from(&mut factor).and(&ui).and(&uj).for_each(|f, &a, &b| {
            *f = -four * pi * pj * a * b;
        });
        if i == j {
            factor.mapv_inplace(|v| v + two * pi);
        }
        Some(factor.into_shape_with_order((m, n)).unwrap() * &k)
    }
}

/// Periodic covariance model (1-dimensional)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Periodic();

impl fmt::Display for Periodic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Periodic")
    }
}

impl<F: Float> CovarianceModel<F> for Periodic {
    fn name(&self) -> &str {
        "Periodic"
    }

    fn dim(&self) -> usize {
        1
    }

    fn n_params(&self) -> usize {
        3
    }

    /// k(x, x') = p_0^2 * exp( -2 sin(pi |x - x'| / p_2) / p_1^2 )
    ///
    /// Carries no parameter gradient and no derivative covariance.
    fn value(&self, x1: ArrayView2<F>, x2: ArrayView2<F>, kpar: ArrayView1<F>) -> Array2<F> {
        let pi = F::cast(std::f64::consts::PI);
        let two = F::cast(2.);
        let amplitude = kpar[0] * kpar[0];
        let length_scale = kpar[1] * kpar[1];
        let period = kpar[2];
        pairwise_differences(&x1, &x2)
            .column(0)
            .mapv(|v| amplitude * F::exp(-two * F::sin(pi * v.abs() / period) / length_scale))
            .into_shape_with_order((x1.nrows(), x2.nrows()))
            .unwrap()
    }
}

/// A covariance model defined by a scalar formula evaluated over every pair
/// of locations: the generic path behind [`Kernel::from_fn`](crate::Kernel::from_fn),
/// used when no specialized matrix evaluator exists for a formula.
#[derive(Clone)]
pub struct ScalarFormula<F: Float> {
    name: String,
    dim: usize,
    n_params: usize,
    formula: Arc<dyn Fn(ArrayView1<F>, ArrayView1<F>, ArrayView1<F>) -> F + Send + Sync>,
    gradient: Option<
        Arc<
            dyn Fn(ArrayView2<F>, ArrayView2<F>, ArrayView1<F>, Option<usize>) -> ParGrad<F>
                + Send
                + Sync,
        >,
    >,
}

impl<F: Float> ScalarFormula<F> {
    /// A family evaluating `formula(x, x', kpar)` over the full outer grid of
    /// `x1` rows against `x2` rows.
    pub fn new(
        name: impl Into<String>,
        dim: usize,
        n_params: usize,
        formula: impl Fn(ArrayView1<F>, ArrayView1<F>, ArrayView1<F>) -> F + Send + Sync + 'static,
    ) -> ScalarFormula<F> {
        ScalarFormula {
            name: name.into(),
            dim,
            n_params,
            formula: Arc::new(formula),
            gradient: None,
        }
    }

    /// Attach an analytic gradient evaluator to the formula
    pub fn with_gradient(
        mut self,
        gradient: impl Fn(ArrayView2<F>, ArrayView2<F>, ArrayView1<F>, Option<usize>) -> ParGrad<F>
            + Send
            + Sync
            + 'static,
    ) -> ScalarFormula<F> {
        self.gradient = Some(Arc::new(gradient));
        self
    }
}

impl<F: Float> fmt::Display for ScalarFormula<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<F: Float> CovarianceModel<F> for ScalarFormula<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_params(&self) -> usize {
        self.n_params
    }

    fn value(&self, x1: ArrayView2<F>, x2: ArrayView2<F>, kpar: ArrayView1<F>) -> Array2<F> {
        let mut k = Array2::zeros((x1.nrows(), x2.nrows()));
        for (i, xi) in x1.rows().into_iter().enumerate() {
            for (j, xj) in x2.rows().into_iter().enumerate() {
                k[[i, j]] = (self.formula)(xi, xj, kpar);
            }
        }
        k
    }

    fn param_gradient(
        &self,
        x1: ArrayView2<F>,
        x2: ArrayView2<F>,
        kpar: ArrayView1<F>,
        ind: Option<usize>,
    ) -> Option<ParGrad<F>> {
        self.gradient
            .as_ref()
            .map(|gradient| gradient(x1, x2, kpar, ind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_squared_exponential_value() {
        let x1 = array![[0.], [1.], [2.]];
        let x2 = array![[0.5]];
        let kpar = array![2., 0.5];
        let res = SquaredExponential::new(1).value(x1.view(), x2.view(), kpar.view());
        let expected = array![
            [2. * f64::exp(-0.125)],
            [2. * f64::exp(-0.125)],
            [2. * f64::exp(-1.125)]
        ];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_squared_exponential_value_2d() {
        let x1 = array![[0., 1.]];
        let x2 = array![[2., 3.], [0., 1.]];
        let kpar = array![1.5, 2., 0.25];
        let res = SquaredExponential::new(2).value(x1.view(), x2.view(), kpar.view());
        // exponent = 2 * (-2)^2 + 0.25 * (-2)^2 = 9
        let expected = array![[1.5 * f64::exp(-9.), 1.5]];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_squared_exponential_amplitude_partial_is_unit_formula() {
        let x1 = array![[0.3], [0.9]];
        let x2 = array![[0.1], [1.4]];
        let kpar = array![3., 0.7];
        let model = SquaredExponential::new(1);
        let grad = CovarianceModel::<f64>::param_gradient(
            &model,
            x1.view(),
            x2.view(),
            kpar.view(),
            Some(0),
        )
        .unwrap()
        .into_single()
        .unwrap();
        let unit = array![1., 0.7];
        let expected = model.value(x1.view(), x2.view(), unit.view());
        assert_abs_diff_eq!(grad, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_periodic_value() {
        let x1 = array![[0.3]];
        let x2 = array![[0.9]];
        let kpar = array![1.5, 0.9, 1.2];
        let res = Periodic().value(x1.view(), x2.view(), kpar.view());
        let expected = 1.5 * 1.5 * f64::exp(-2. * (std::f64::consts::PI * 0.6 / 1.2).sin() / 0.81);
        assert_abs_diff_eq!(res[[0, 0]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_periodic_carries_no_gradient() {
        let x = array![[0.], [1.]];
        let kpar = array![1., 1., 1.];
        assert!(CovarianceModel::<f64>::param_gradient(
            &Periodic(),
            x.view(),
            x.view(),
            kpar.view(),
            None
        )
        .is_none());
        assert!(
            CovarianceModel::<f64>::deriv_value(&Periodic(), x.view(), x.view(), kpar.view(), 0, 0)
                .is_none()
        );
    }

    #[test]
    fn test_scalar_formula_outer_grid() {
        let dot = ScalarFormula::new("Linear", 1, 1, |x1, x2, kpar| kpar[0] * x1[0] * x2[0]);
        let x1 = array![[1.], [2.]];
        let x2 = array![[3.]];
        let kpar = array![2.];
        let res = dot.value(x1.view(), x2.view(), kpar.view());
        assert_abs_diff_eq!(res, array![[6.], [12.]], epsilon = 1e-12);
        assert!(dot
            .param_gradient(x1.view(), x2.view(), kpar.view(), None)
            .is_none());
    }
}
