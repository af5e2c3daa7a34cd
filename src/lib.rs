//! This library implements covariance kernel building blocks for
//! [Gaussian process](https://en.wikipedia.org/wiki/Gaussian_process) modeling:
//! closed-form kernel functions together with their analytic derivatives with
//! respect to the kernel hyperparameters, and an algebra to compose kernels
//! by addition.
//!
//! A [`Kernel`] binds a covariance family (see [`covariance_models`]) to a
//! hyperparameter source and evaluates covariance matrices over coordinate
//! sets given as `(n, dim)` arrays. Hyperparameter-fitting routines consume
//! [`Kernel::cov`] and [`Kernel::cov_par_grad`] as black-box oracles.
//!
//! ```
//! use gp_kernels::Kernel;
//! use ndarray::array;
//!
//! let kernel = Kernel::<f64>::squared_exponential(1);
//! let k = kernel.gram(&array![[0.0], [1.0]]).unwrap();
//! assert!((k[[0, 0]] - 1.0).abs() < 1e-12);
//! assert!((k[[0, 1]] - (-1.0f64).exp()).abs() < 1e-12);
//! ```
//!
//! Kernels are closed under `+`, producing an [`AddKernel`] whose covariance
//! is the pointwise sum of its members. [`GradientKernel`] adds the
//! derivative covariance mode used by gradient-enhanced models.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod compose;
pub mod covariance_models;
mod errors;
mod gradient;
mod kernel;
mod parameters;
mod utils;

pub use compose::*;
pub use covariance_models::ParGrad;
pub use errors::*;
pub use gradient::*;
pub use kernel::*;
pub use parameters::*;
pub use utils::{into_column, pairwise_differences};
