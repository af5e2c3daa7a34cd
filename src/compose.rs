use crate::errors::{KernelError, Result};
use crate::kernel::Kernel;
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use std::fmt;
use std::ops::Add;

/// An ordered sum of kernels.
///
/// The covariance of a sum is the pointwise sum of the member covariances,
/// each member resolving its own hyperparameters independently; the sum
/// carries no parameters of its own. Member order is preserved left to right
/// through every composition and is significant only in being deterministic.
#[derive(Clone, Debug)]
pub struct AddKernel<F: Float> {
    kernels: Vec<Kernel<F>>,
}

impl<F: Float> fmt::Display for AddKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, kernel) in self.kernels.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{kernel}")?;
        }
        Ok(())
    }
}

impl<F: Float> AddKernel<F> {
    /// A sum over the given members, in order
    pub fn new(kernels: Vec<Kernel<F>>) -> AddKernel<F> {
        AddKernel { kernels }
    }

    /// The ordered members of the sum
    pub fn members(&self) -> &[Kernel<F>] {
        &self.kernels
    }

    /// Append a single kernel after the current members
    pub fn append(mut self, kernel: Kernel<F>) -> AddKernel<F> {
        self.kernels.push(kernel);
        self
    }

    /// Concatenate another sum's members after the current ones
    pub fn merge(mut self, other: AddKernel<F>) -> AddKernel<F> {
        self.kernels.extend(other.kernels);
        self
    }

    /// Pointwise sum of the member covariance matrices, of shape
    /// (nrows(x1), nrows(x2)). Erroring on an empty sum, which has no member
    /// to define an input dimension.
    pub fn cov(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        let mut members = self.kernels.iter();
        let first = members
            .next()
            .ok_or_else(|| KernelError::InvalidValueError("empty kernel sum".to_string()))?;
        let mut total = first.cov(x1, x2)?;
        for kernel in members {
            total += &kernel.cov(x1, x2)?;
        }
        Ok(total)
    }

    /// Self covariance of the sum, the `x2`-omitted case
    pub fn gram(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.cov(x, x)
    }
}

impl<F: Float> Add for Kernel<F> {
    type Output = AddKernel<F>;

    fn add(self, other: Kernel<F>) -> AddKernel<F> {
        AddKernel::new(vec![self, other])
    }
}

impl<F: Float> Add<AddKernel<F>> for Kernel<F> {
    type Output = AddKernel<F>;

    fn add(self, other: AddKernel<F>) -> AddKernel<F> {
        AddKernel::new(vec![self]).merge(other)
    }
}

impl<F: Float> Add<Kernel<F>> for AddKernel<F> {
    type Output = AddKernel<F>;

    fn add(self, other: Kernel<F>) -> AddKernel<F> {
        self.append(other)
    }
}

impl<F: Float> Add for AddKernel<F> {
    type Output = AddKernel<F>;

    fn add(self, other: AddKernel<F>) -> AddKernel<F> {
        self.merge(other)
    }
}
