use crate::errors::{KernelError, Result};
use crate::kernel::Kernel;
use linfa::Float;
use log::debug;
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix2};
use std::fmt;

/// Which covariance a [`GradientKernel`] evaluates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Comp {
    /// The ordinary covariance of the process values
    #[default]
    X,
    /// The joint covariance of the process partial derivatives along every
    /// pair of input dimensions
    DxDx,
}

/// A kernel with a derivative covariance evaluation mode.
///
/// Beyond the ordinary covariance it evaluates, per ordered pair of input
/// dimensions `(i, j)`, the covariance block between the process derivatives
/// `dY/dx_i` at `x1` and `dY/dx_j` at `x2`, and assembles the `dim x dim`
/// blocks into one matrix of shape `(dim * M, dim * N)`. Families without the
/// derivative capability degrade to `Ok(None)` rather than erroring; callers
/// treat a missing result as "derivative covariance unsupported".
#[derive(Clone, Debug)]
pub struct GradientKernel<F: Float> {
    kernel: Kernel<F>,
}

impl<F: Float> fmt::Display for GradientKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Gradient({})", self.kernel)
    }
}

impl<F: Float> GradientKernel<F> {
    /// Wrap a kernel, inheriting its family's derivative capability
    pub fn new(kernel: Kernel<F>) -> GradientKernel<F> {
        GradientKernel { kernel }
    }

    /// A squared exponential gradient kernel with unit hyperparameters;
    /// supports [`Comp::DxDx`]
    pub fn squared_exponential(dim: usize) -> GradientKernel<F> {
        GradientKernel::new(Kernel::squared_exponential(dim))
    }

    /// A squared exponential gradient kernel with explicit hyperparameters
    pub fn squared_exponential_with(kpar: Array1<F>, dim: usize) -> Result<GradientKernel<F>> {
        Ok(GradientKernel::new(Kernel::squared_exponential_with(
            kpar, dim,
        )?))
    }

    /// The wrapped kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Unwrap into the plain kernel, e.g. to compose it into a sum
    pub fn into_kernel(self) -> Kernel<F> {
        self.kernel
    }

    /// Ordinary covariance, delegated to the wrapped kernel
    pub fn cov(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        self.kernel.cov(x1, x2)
    }

    /// Self covariance, delegated to the wrapped kernel
    pub fn gram(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.kernel.gram(x)
    }

    /// Covariance for the requested component mode: [`Comp::X`] always yields
    /// the ordinary matrix, [`Comp::DxDx`] yields the full derivative
    /// covariance when the family supports it and `Ok(None)` when it does not.
    pub fn cov_comp(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
        comp: Comp,
    ) -> Result<Option<Array2<F>>> {
        match comp {
            Comp::X => self.kernel.cov(x1, x2).map(Some),
            Comp::DxDx => self.deriv_cov(x1, x2),
        }
    }

    /// Full derivative covariance matrix of shape `(dim * M, dim * N)`:
    /// block `(i, j)` occupies rows `i*M..(i+1)*M` and columns
    /// `j*N..(j+1)*N`, blocks assembled in row-major dimension order.
    pub fn deriv_cov(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Option<Array2<F>>> {
        self.kernel.check_inputs(x1.ncols(), x2.ncols())?;
        let kpar = self.kernel.params();
        self.kernel.check_params_len(kpar.len())?;

        let dim = self.kernel.dim();
        let (m, n) = (x1.nrows(), x2.nrows());
        let mut full = Array2::zeros((dim * m, dim * n));
        for i in 0..dim {
            for j in 0..dim {
                match self
                    .kernel
                    .model()
                    .deriv_value(x1.view(), x2.view(), kpar.view(), i, j)
                {
                    Some(block) => full
                        .slice_mut(s![i * m..(i + 1) * m, j * n..(j + 1) * n])
                        .assign(&block),
                    None => {
                        debug!(
                            "{} kernel carries no derivative covariance",
                            self.kernel.name()
                        );
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(full))
    }

    /// A single `(i, j)` derivative covariance block of shape `(M, N)`
    pub fn deriv_cov_block(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
        i: usize,
        j: usize,
    ) -> Result<Option<Array2<F>>> {
        self.kernel.check_inputs(x1.ncols(), x2.ncols())?;
        let kpar = self.kernel.params();
        self.kernel.check_params_len(kpar.len())?;
        let dim = self.kernel.dim();
        if i >= dim || j >= dim {
            return Err(KernelError::InvalidValueError(format!(
                "derivative component ({}, {}) out of range for {}-dimensional kernel",
                i, j, dim
            )));
        }
        match self
            .kernel
            .model()
            .deriv_value(x1.view(), x2.view(), kpar.view(), i, j)
        {
            Some(block) => Ok(Some(block)),
            None => {
                debug!(
                    "{} kernel carries no derivative covariance",
                    self.kernel.name()
                );
                Ok(None)
            }
        }
    }
}
