use crate::errors::{GpError, Result};
use linfa::Float;
use log::{debug, info, warn};
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A model whose log hyperparameters can be tuned by maximizing its log likelihood
pub trait LikelihoodModel<F: Float> {
    /// Current log hyperparameters
    fn current_log_hyper(&self) -> Array1<F>;

    /// Set log hyperparameters and bring the model back to a state where
    /// likelihood can be evaluated
    fn update_log_hyper(&mut self, log_hyper: &Array1<F>) -> Result<()>;

    /// Log marginal likelihood
    fn likelihood(&self) -> Result<F>;

    /// Gradient of the log marginal likelihood with respect to log hyperparameters
    fn likelihood_gradient(&self) -> Result<Array1<F>>;
}

/// RProp optimizer parameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize), serde(default))]
pub struct RpropParams<F: Float> {
    /// Initial step size
    pub delta0: F,
    /// Lower bound of step sizes
    pub delta_min: F,
    /// Upper bound of step sizes
    pub delta_max: F,
    /// Step decrease factor on gradient sign change
    pub eta_minus: F,
    /// Step increase factor while gradient sign is kept
    pub eta_plus: F,
    /// Stop when the gradient norm falls under this value
    pub eps_stop: F,
    /// Maximum number of iterations
    pub max_iters: usize,
}

impl<F: Float> Default for RpropParams<F> {
    fn default() -> Self {
        RpropParams {
            delta0: F::cast(0.1),
            delta_min: F::cast(1e-6),
            delta_max: F::cast(50.),
            eta_minus: F::cast(0.5),
            eta_plus: F::cast(1.2),
            eps_stop: F::cast(1e-4),
            max_iters: 100,
        }
    }
}

impl<F: Float> RpropParams<F> {
    /// Check parameters consistency
    pub fn check(&self) -> Result<()> {
        if !(self.delta_min > F::zero()
            && self.delta_min <= self.delta0
            && self.delta0 <= self.delta_max)
        {
            return Err(GpError::InvalidValueError(format!(
                "RProp steps should satisfy 0 < delta_min ({}) <= delta0 ({}) <= delta_max ({})",
                self.delta_min, self.delta0, self.delta_max
            )));
        }
        if !(self.eta_minus > F::zero() && self.eta_minus < F::one()) {
            return Err(GpError::InvalidValueError(format!(
                "RProp eta_minus should be in ]0, 1[, got {}",
                self.eta_minus
            )));
        }
        if self.eta_plus <= F::one() {
            return Err(GpError::InvalidValueError(format!(
                "RProp eta_plus should be greater than 1, got {}",
                self.eta_plus
            )));
        }
        if self.eps_stop < F::zero() {
            return Err(GpError::InvalidValueError(format!(
                "RProp eps_stop should be positive, got {}",
                self.eps_stop
            )));
        }
        Ok(())
    }
}

/// Result of a likelihood maximization
#[derive(Clone, Debug, PartialEq)]
pub struct RpropResult<F: Float> {
    /// Best log likelihood found
    pub log_likelihood: F,
    /// Log hyperparameters giving the best log likelihood
    pub log_hyper: Array1<F>,
    /// Number of iterations done
    pub n_iters: usize,
}

/// Resilient backpropagation (iRprop-) maximizing a log likelihood.
///
/// Each parameter has its own step size: it grows while the gradient keeps its
/// sign and shrinks, skipping the update, when the sign flips. Only gradient
/// signs are used so the log likelihood scale does not matter.
#[derive(Clone, Debug, Default)]
pub struct Rprop<F: Float> {
    params: RpropParams<F>,
}

impl<F: Float> Rprop<F> {
    /// Constructor
    pub fn new(params: RpropParams<F>) -> Self {
        Rprop { params }
    }

    /// Parameters
    pub fn params(&self) -> &RpropParams<F> {
        &self.params
    }

    /// Maximize the log likelihood of `model`, which is left with the best
    /// hyperparameters found (never worse than the starting ones).
    pub fn maximize<M: LikelihoodModel<F>>(&self, model: &mut M) -> Result<RpropResult<F>> {
        self.params.check()?;
        let now = Instant::now();
        let p = &self.params;

        let mut log_hyper = model.current_log_hyper();
        let dim = log_hyper.len();
        let mut delta = Array1::from_elem(dim, p.delta0);
        let mut grad_old = Array1::<F>::zeros(dim);
        let mut best_params = log_hyper.clone();
        let mut best = model.likelihood()?;
        debug!("RProp start: lik={} params={}", best, log_hyper);

        let mut n_iters = 0;
        for i in 0..p.max_iters {
            n_iters = i + 1;
            let mut grad = model.likelihood_gradient()?.mapv(|v| -v);
            if grad.dot(&grad).sqrt() < p.eps_stop {
                break;
            }
            for j in 0..dim {
                let agreement = grad_old[j] * grad[j];
                if agreement > F::zero() {
                    delta[j] = (delta[j] * p.eta_plus).min(p.delta_max);
                } else if agreement < F::zero() {
                    delta[j] = (delta[j] * p.eta_minus).max(p.delta_min);
                    grad[j] = F::zero();
                }
                log_hyper[j] -= sign(grad[j]) * delta[j];
            }
            grad_old = grad;

            match model.update_log_hyper(&log_hyper) {
                Ok(()) => (),
                Err(GpError::NumericalError(msg)) => {
                    warn!("RProp stopped at iter {}: {}", n_iters, msg);
                    break;
                }
                Err(err) => return Err(err),
            }
            let lik = model.likelihood()?;
            debug!("RProp iter={} lik={} params={}", n_iters, lik, log_hyper);
            if lik > best {
                best = lik;
                best_params = log_hyper.clone();
            }
        }
        model.update_log_hyper(&best_params)?;
        info!(
            "RProp best lik={} params={} ({} iters, elapsed {}ms)",
            best,
            best_params,
            n_iters,
            now.elapsed().as_millis()
        );
        Ok(RpropResult {
            log_likelihood: best,
            log_hyper: best_params,
            n_iters,
        })
    }
}

fn sign<F: Float>(v: F) -> F {
    if v > F::zero() {
        F::one()
    } else if v < F::zero() {
        -F::one()
    } else {
        F::zero()
    }
}
