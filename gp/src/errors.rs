use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using a [`GaussianProcess`](crate::GaussianProcess)
#[derive(Error, Debug)]
pub enum GpError {
    /// When a value is invalid (length mismatch, empty training set queried, bad parameter)
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When the model caches are not valid for the current samples or hyperparameters
    #[error("Uninitialized error: {0}")]
    UninitializedError(String),
    /// When the augmented kernel matrix is not positive definite
    #[error("Numerical error: {0}")]
    NumericalError(String),
    #[error(transparent)]
    /// When linear algebra computation fails
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When array shapes are incompatible
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}

impl GpError {
    /// Turn a factorization failure into a [`GpError::NumericalError`] when the
    /// matrix was not positive definite.
    pub(crate) fn from_factorization(err: linfa_linalg::LinalgError, what: &str) -> Self {
        match err {
            linfa_linalg::LinalgError::NotPositiveDefinite => GpError::NumericalError(format!(
                "{what} is not positive definite"
            )),
            err => GpError::LinalgError(err),
        }
    }
}
