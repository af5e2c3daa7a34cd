use thiserror::Error;

/// A result type for kernel evaluation
pub type Result<T> = std::result::Result<T, KernelError>;

/// An error when evaluating a [`Kernel`](crate::Kernel) or a composition of kernels
#[derive(Error, Debug)]
pub enum KernelError {
    /// When coordinate inputs do not match the kernel input dimension
    #[error("Dimension mismatch: {0}")]
    DimensionMismatchError(String),
    /// When a hyperparameter vector has a wrong length
    #[error("Hyperparameter error: {0}")]
    HyperparameterError(String),
    /// When an error is due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}
