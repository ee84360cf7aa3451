use crate::covariance_models::CovarianceModel;
use crate::errors::{GpError, Result};
use crate::optimization::RpropParams;
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default number of allocated rows of the augmented Cholesky factor
pub const GP_INITIAL_CAPACITY: usize = 1500;
/// Default variance of value observations
pub const GP_NOISE: f64 = 1e-8;
/// Default variance of gradient observations
pub const GP_GRADIENT_NOISE: f64 = 1.0;

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Cov: Serialize",
        deserialize = "F: Deserialize<'de>, Cov: Deserialize<'de>"
    ))
)]
pub struct GpValidParams<F: Float, Cov: CovarianceModel<F>> {
    /// Covariance model k(x, x') and its initial hyperparameters
    pub(crate) cov: Cov,
    /// Number of rows allocated for the augmented factor on first use
    pub(crate) initial_capacity: usize,
    /// Variance added to the diagonal of value observations
    pub(crate) noise: F,
    /// Variance added to the diagonal of gradient observations
    pub(crate) gradient_noise: F,
    /// Whether hyperparameters are tuned by likelihood maximization when fitting
    pub(crate) optimise: bool,
    /// Likelihood maximization settings
    pub(crate) rprop: RpropParams<F>,
}

impl<F: Float, Cov: CovarianceModel<F>> Default for GpValidParams<F, Cov> {
    fn default() -> GpValidParams<F, Cov> {
        GpValidParams {
            cov: Cov::default(),
            initial_capacity: GP_INITIAL_CAPACITY,
            noise: F::cast(GP_NOISE),
            gradient_noise: F::cast(GP_GRADIENT_NOISE),
            optimise: false,
            rprop: RpropParams::default(),
        }
    }
}

impl<F: Float, Cov: CovarianceModel<F>> GpValidParams<F, Cov> {
    /// Get covariance model
    pub fn covariance(&self) -> &Cov {
        &self.cov
    }

    /// Get initial capacity of the augmented factor
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Get value observation noise
    pub fn noise(&self) -> F {
        self.noise
    }

    /// Get gradient observation noise
    pub fn gradient_noise(&self) -> F {
        self.gradient_noise
    }

    /// Whether hyperparameters are optimized at fit time
    pub fn optimise(&self) -> bool {
        self.optimise
    }

    /// Get RProp settings
    pub fn rprop(&self) -> &RpropParams<F> {
        &self.rprop
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP algorithm](struct.GaussianProcess.html).
pub struct GpParams<F: Float, Cov: CovarianceModel<F>>(GpValidParams<F, Cov>);

impl<F: Float, Cov: CovarianceModel<F>> GpParams<F, Cov> {
    /// A constructor for GP parameters given a covariance model
    pub fn new(cov: Cov) -> GpParams<F, Cov> {
        Self(GpValidParams {
            cov,
            ..Default::default()
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F, Cov>) -> Self {
        Self(params.clone())
    }

    /// Set covariance model.
    pub fn covariance(mut self, cov: Cov) -> Self {
        self.0.cov = cov;
        self
    }

    /// Set the number of rows allocated for the augmented factor on first use.
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.0.initial_capacity = initial_capacity;
        self
    }

    /// Set value observation noise variance.
    pub fn noise(mut self, noise: F) -> Self {
        self.0.noise = noise;
        self
    }

    /// Set gradient observation noise variance.
    /// A large value makes gradient targets weakly informative.
    pub fn gradient_noise(mut self, gradient_noise: F) -> Self {
        self.0.gradient_noise = gradient_noise;
        self
    }

    /// Enable likelihood maximization at fit time.
    pub fn optimise(mut self, optimise: bool) -> Self {
        self.0.optimise = optimise;
        self
    }

    /// Set RProp settings.
    pub fn rprop(mut self, rprop: RpropParams<F>) -> Self {
        self.0.rprop = rprop;
        self
    }
}

impl<F: Float, Cov: CovarianceModel<F>> ParamGuard for GpParams<F, Cov> {
    type Checked = GpValidParams<F, Cov>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !(self.0.noise >= F::zero() && self.0.noise.is_finite()) {
            return Err(GpError::InvalidValueError(format!(
                "noise should be positive and finite, got {}",
                self.0.noise
            )));
        }
        if !(self.0.gradient_noise >= F::zero() && self.0.gradient_noise.is_finite()) {
            return Err(GpError::InvalidValueError(format!(
                "gradient noise should be positive and finite, got {}",
                self.0.gradient_noise
            )));
        }
        if self.0.initial_capacity == 0 {
            return Err(GpError::InvalidValueError(
                "initial capacity should be at least 1".to_string(),
            ));
        }
        self.0.rprop.check()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance_models::ThinPlateCov;

    #[test]
    fn test_params_check() {
        let params = GpParams::new(ThinPlateCov::<f64>::default());
        let valid = params.clone().check().unwrap();
        assert_eq!(valid.initial_capacity(), GP_INITIAL_CAPACITY);
        assert!(!valid.optimise());

        assert!(params.clone().noise(-1.).check().is_err());
        assert!(params.clone().gradient_noise(f64::NAN).check().is_err());
        assert!(params.clone().initial_capacity(0).check().is_err());
        let rprop = RpropParams {
            eta_minus: 2.,
            ..Default::default()
        };
        assert!(params.rprop(rprop).check().is_err());
    }
}
