//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! of implicit surfaces: a scalar function `f: R³ -> R` whose zero level set is the surface,
//! learnt from labelled 3D points (0 on the surface, negative inside, positive outside).
//!
//! Every sample is observed through its value and its gradient, the kernel matrix is thus
//! augmented with first and second derivatives of the covariance function (see
//! [covariance_models]). Samples can be added incrementally: the Cholesky factor of the
//! augmented matrix is extended by blocks instead of being recomputed.
//!
//! GP regression is implemented by [GaussianProcess] parameterized by [GpParams],
//! hyperparameters can be tuned by likelihood maximization with [Rprop].
#![warn(missing_docs)]
mod algorithm;
pub mod covariance_models;
mod errors;
mod optimization;
mod parameters;
mod sample_set;
mod utils;

pub use algorithm::*;
pub use covariance_models::{
    CovarianceModel, LaplaceCov, SquaredExponentialArdCov, SquaredExponentialCov, ThinPlateCov,
};
pub use errors::*;
pub use optimization::*;
pub use parameters::*;
pub use sample_set::*;
pub use utils::{compute_tangent_basis, cross, normalized, GrowableMatrix};
