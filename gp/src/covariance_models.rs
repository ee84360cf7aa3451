//! A module for stationary covariance models able to provide the derivative
//! terms needed by a Gaussian process observing values and gradients.
//!
//! The following covariance models are implemented:
//! * thin plate,
//! * squared exponential,
//! * squared exponential with automatic relevance determination,
//! * laplace (absolute exponential).
//!
//! Every model is a function of `r = x1 - x2` and hands out `k(r)`, `∂k/∂x1`
//! and `∂²k/∂x1∂x1` together in a [`KernelTerms`], from which the 4x4 block
//! coupling `(f, ∇f)(x1)` with `(f, ∇f)(x2)` is assembled:
//!
//! ```text
//! B(x1, x2) = [ k        -∂k/∂x1ᵀ     ]
//!             [ ∂k/∂x1   -∂²k/∂x1∂x1  ]
//! ```
//!
//! Hyperparameters are handled in log space.

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value, gradient and hessian of a covariance function with respect to its first argument
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelTerms<F: Float> {
    /// k(x1, x2)
    pub value: F,
    /// ∂k/∂x1
    pub gradient: [F; 3],
    /// ∂²k/∂x1∂x1
    pub hessian: [[F; 3]; 3],
}

impl<F: Float> KernelTerms<F> {
    /// All terms set to zero
    pub fn zeros() -> Self {
        KernelTerms {
            value: F::zero(),
            gradient: [F::zero(); 3],
            hessian: [[F::zero(); 3]; 3],
        }
    }

    /// Terms multiplied by a constant factor
    pub fn scaled(&self, factor: F) -> Self {
        let mut res = *self;
        res.value *= factor;
        for a in 0..3 {
            res.gradient[a] *= factor;
            for b in 0..3 {
                res.hessian[a][b] *= factor;
            }
        }
        res
    }

    /// Augmented 4x4 covariance block between `(f, ∇f)(x1)` and `(f, ∇f)(x2)`
    pub fn block(&self) -> Array2<F> {
        let mut blk = Array2::zeros((4, 4));
        blk[[0, 0]] = self.value;
        for a in 0..3 {
            blk[[0, a + 1]] = -self.gradient[a];
            blk[[a + 1, 0]] = self.gradient[a];
            for b in 0..3 {
                blk[[a + 1, b + 1]] = -self.hessian[a][b];
            }
        }
        blk
    }
}

/// A trait for covariance models used by the derivative-augmented GP regression
pub trait CovarianceModel<F: Float>:
    Clone + Copy + Default + fmt::Debug + fmt::Display + Send + Sync
{
    /// Number of hyperparameters
    fn n_hyper(&self) -> usize;

    /// Hyperparameters in log space
    fn log_hyper(&self) -> Array1<F>;

    /// Set hyperparameters given in log space
    fn set_log_hyper(&mut self, log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()>;

    /// Value, gradient and hessian at `r = x1 - x2`
    fn terms(&self, r: &[F; 3]) -> KernelTerms<F>;

    /// Derivatives of [`CovarianceModel::terms`] with respect to each log hyperparameter
    fn hyper_terms(&self, r: &[F; 3]) -> Vec<KernelTerms<F>>;

    /// k(x, x)
    fn self_covariance(&self) -> F {
        self.terms(&[F::zero(); 3]).value
    }

    /// k(x1, x2)
    fn get(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> F {
        self.terms(&difference(x1, x2)).value
    }

    /// ∂k/∂x1\[axis\]
    fn get_diff(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
        axis: usize,
    ) -> F {
        self.terms(&difference(x1, x2)).gradient[axis]
    }

    /// ∂²k/∂x1\[axis1\]∂x1\[axis2\]
    fn get_diff2(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
        axis1: usize,
        axis2: usize,
    ) -> F {
        self.terms(&difference(x1, x2)).hessian[axis1][axis2]
    }

    /// Augmented 4x4 block between `(f, ∇f)(x1)` and `(f, ∇f)(x2)`
    fn block(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        self.terms(&difference(x1, x2)).block()
    }

    /// Derivatives of the augmented block with respect to each log hyperparameter,
    /// used by the log likelihood gradient.
    fn hyper_blocks(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Vec<Array2<F>> {
        self.hyper_terms(&difference(x1, x2))
            .iter()
            .map(|t| t.block())
            .collect()
    }
}

/// `x1 - x2` for 3D points
pub fn difference<F: Float>(
    x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
    x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> [F; 3] {
    [x1[0] - x2[0], x1[1] - x2[1], x1[2] - x2[2]]
}

fn squared_norm<F: Float>(r: &[F; 3]) -> F {
    r[0] * r[0] + r[1] * r[1] + r[2] * r[2]
}

fn kronecker<F: Float>(a: usize, b: usize) -> F {
    if a == b {
        F::one()
    } else {
        F::zero()
    }
}

fn check_log_hyper<F: Float>(
    log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>,
    expected: usize,
) -> Result<()> {
    if log_hyper.len() != expected {
        return Err(GpError::InvalidValueError(format!(
            "expected {} log hyperparameters, got {}",
            expected,
            log_hyper.len()
        )));
    }
    if log_hyper.iter().any(|v| !v.is_finite()) {
        return Err(GpError::InvalidValueError(format!(
            "log hyperparameters should be finite, got {log_hyper}"
        )));
    }
    Ok(())
}

fn check_positive<F: Float>(name: &str, value: F) -> Result<F> {
    if value > F::zero() && value.is_finite() {
        Ok(value)
    } else {
        Err(GpError::InvalidValueError(format!(
            "{name} should be strictly positive and finite, got {value}"
        )))
    }
}

/// Thin plate covariance `k = 2d³ - 3ℓd² + ℓ³` where `d = |x1 - x2|`.
///
/// `ℓ` should be at least the largest distance between training points for the
/// augmented kernel matrix to be positive definite.
/// Hyperparameters: `[log ℓ]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ThinPlateCov<F: Float> {
    length: F,
}

impl<F: Float> Default for ThinPlateCov<F> {
    fn default() -> Self {
        ThinPlateCov { length: F::one() }
    }
}

impl<F: Float> ThinPlateCov<F> {
    /// Constructor given the length parameter `ℓ > 0`
    pub fn new(length: F) -> Result<Self> {
        Ok(ThinPlateCov {
            length: check_positive("thin plate length", length)?,
        })
    }

    /// Length parameter
    pub fn length(&self) -> F {
        self.length
    }
}

impl<F: Float> fmt::Display for ThinPlateCov<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ThinPlate(length={})", self.length)
    }
}

impl<F: Float> CovarianceModel<F> for ThinPlateCov<F> {
    fn n_hyper(&self) -> usize {
        1
    }

    fn log_hyper(&self) -> Array1<F> {
        Array1::from_elem(1, self.length.ln())
    }

    fn set_log_hyper(&mut self, log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_log_hyper(log_hyper, 1)?;
        self.length = log_hyper[0].exp();
        Ok(())
    }

    fn terms(&self, r: &[F; 3]) -> KernelTerms<F> {
        let (two, three, six) = (F::cast(2.), F::cast(3.), F::cast(6.));
        let l = self.length;
        let d2 = squared_norm(r);
        let d = d2.sqrt();
        let mut t = KernelTerms::zeros();
        t.value = two * d2 * d - three * l * d2 + l * l * l;
        for a in 0..3 {
            t.gradient[a] = six * (d - l) * r[a];
            for b in 0..3 {
                // r rᵀ / d vanishes at d = 0
                let outer = if d > F::zero() {
                    six * r[a] * r[b] / d
                } else {
                    F::zero()
                };
                t.hessian[a][b] = outer + six * (d - l) * kronecker(a, b);
            }
        }
        t
    }

    fn hyper_terms(&self, r: &[F; 3]) -> Vec<KernelTerms<F>> {
        let (three, six) = (F::cast(3.), F::cast(6.));
        let l = self.length;
        let d2 = squared_norm(r);
        let mut dl = KernelTerms::zeros();
        dl.value = l * (three * l * l - three * d2);
        for a in 0..3 {
            dl.gradient[a] = -six * l * r[a];
            dl.hessian[a][a] = -six * l;
        }
        vec![dl]
    }
}

/// Squared exponential covariance `k = σ² exp(-d² / 2ℓ²)`.
///
/// Hyperparameters: `[log ℓ, log σ]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct SquaredExponentialCov<F: Float> {
    length: F,
    sigma: F,
}

impl<F: Float> Default for SquaredExponentialCov<F> {
    fn default() -> Self {
        SquaredExponentialCov {
            length: F::one(),
            sigma: F::one(),
        }
    }
}

impl<F: Float> SquaredExponentialCov<F> {
    /// Constructor given the length scale `ℓ > 0` and the amplitude `σ > 0`
    pub fn new(length: F, sigma: F) -> Result<Self> {
        Ok(SquaredExponentialCov {
            length: check_positive("squared exponential length", length)?,
            sigma: check_positive("squared exponential sigma", sigma)?,
        })
    }

    /// Length scale
    pub fn length(&self) -> F {
        self.length
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }
}

impl<F: Float> fmt::Display for SquaredExponentialCov<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SquaredExponential(length={}, sigma={})",
            self.length, self.sigma
        )
    }
}

impl<F: Float> CovarianceModel<F> for SquaredExponentialCov<F> {
    fn n_hyper(&self) -> usize {
        2
    }

    fn log_hyper(&self) -> Array1<F> {
        Array1::from_vec(vec![self.length.ln(), self.sigma.ln()])
    }

    fn set_log_hyper(&mut self, log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_log_hyper(log_hyper, 2)?;
        self.length = log_hyper[0].exp();
        self.sigma = log_hyper[1].exp();
        Ok(())
    }

    fn terms(&self, r: &[F; 3]) -> KernelTerms<F> {
        let l2 = self.length * self.length;
        let k = self.sigma * self.sigma * F::exp(-squared_norm(r) / (F::cast(2.) * l2));
        let mut t = KernelTerms::zeros();
        t.value = k;
        for a in 0..3 {
            t.gradient[a] = -r[a] / l2 * k;
            for b in 0..3 {
                t.hessian[a][b] = (r[a] * r[b] / (l2 * l2) - kronecker::<F>(a, b) / l2) * k;
            }
        }
        t
    }

    fn hyper_terms(&self, r: &[F; 3]) -> Vec<KernelTerms<F>> {
        let (two, four) = (F::cast(2.), F::cast(4.));
        let l2 = self.length * self.length;
        let l4 = l2 * l2;
        let base = self.terms(r);
        let k = base.value;
        let dk = k * squared_norm(r) / l2;

        let mut dl = KernelTerms::zeros();
        dl.value = dk;
        for a in 0..3 {
            dl.gradient[a] = -r[a] / l2 * dk + two * r[a] / l2 * k;
            for b in 0..3 {
                let delta = kronecker::<F>(a, b);
                dl.hessian[a][b] = (r[a] * r[b] / l4 - delta / l2) * dk
                    + k * (-four * r[a] * r[b] / l4 + two * delta / l2);
            }
        }
        vec![dl, base.scaled(two)]
    }
}

/// Squared exponential covariance with one length scale per axis
/// `k = σ² exp(-½ Σ r_a² / ℓ_a²)`.
///
/// Hyperparameters: `[log ℓx, log ℓy, log ℓz, log σ]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct SquaredExponentialArdCov<F: Float> {
    lengths: [F; 3],
    sigma: F,
}

impl<F: Float> Default for SquaredExponentialArdCov<F> {
    fn default() -> Self {
        SquaredExponentialArdCov {
            lengths: [F::one(); 3],
            sigma: F::one(),
        }
    }
}

impl<F: Float> SquaredExponentialArdCov<F> {
    /// Constructor given per axis length scales and the amplitude
    pub fn new(lengths: [F; 3], sigma: F) -> Result<Self> {
        for l in lengths {
            check_positive("squared exponential ARD length", l)?;
        }
        Ok(SquaredExponentialArdCov {
            lengths,
            sigma: check_positive("squared exponential ARD sigma", sigma)?,
        })
    }

    /// Length scales
    pub fn lengths(&self) -> [F; 3] {
        self.lengths
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }
}

impl<F: Float> fmt::Display for SquaredExponentialArdCov<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SquaredExponentialArd(lengths=[{}, {}, {}], sigma={})",
            self.lengths[0], self.lengths[1], self.lengths[2], self.sigma
        )
    }
}

impl<F: Float> CovarianceModel<F> for SquaredExponentialArdCov<F> {
    fn n_hyper(&self) -> usize {
        4
    }

    fn log_hyper(&self) -> Array1<F> {
        Array1::from_vec(vec![
            self.lengths[0].ln(),
            self.lengths[1].ln(),
            self.lengths[2].ln(),
            self.sigma.ln(),
        ])
    }

    fn set_log_hyper(&mut self, log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_log_hyper(log_hyper, 4)?;
        for a in 0..3 {
            self.lengths[a] = log_hyper[a].exp();
        }
        self.sigma = log_hyper[3].exp();
        Ok(())
    }

    fn terms(&self, r: &[F; 3]) -> KernelTerms<F> {
        let l2 = self.lengths.map(|l| l * l);
        let q = (0..3).fold(F::zero(), |acc, a| acc + r[a] * r[a] / l2[a]);
        let k = self.sigma * self.sigma * F::exp(-q / F::cast(2.));
        let mut t = KernelTerms::zeros();
        t.value = k;
        for a in 0..3 {
            t.gradient[a] = -r[a] / l2[a] * k;
            for b in 0..3 {
                t.hessian[a][b] =
                    (r[a] * r[b] / (l2[a] * l2[b]) - kronecker::<F>(a, b) / l2[a]) * k;
            }
        }
        t
    }

    fn hyper_terms(&self, r: &[F; 3]) -> Vec<KernelTerms<F>> {
        let two = F::cast(2.);
        let l2 = self.lengths.map(|l| l * l);
        let base = self.terms(r);
        let k = base.value;

        let mut res = Vec::with_capacity(4);
        for c in 0..3 {
            let dk = k * r[c] * r[c] / l2[c];
            let mut dl = KernelTerms::zeros();
            dl.value = dk;
            for a in 0..3 {
                dl.gradient[a] = -r[a] / l2[a] * dk + kronecker::<F>(a, c) * two * r[a] / l2[a] * k;
                for b in 0..3 {
                    let delta = kronecker::<F>(a, b);
                    let cross = r[a] * r[b] / (l2[a] * l2[b]);
                    dl.hessian[a][b] = (cross - delta / l2[a]) * dk
                        + k * (-two * (kronecker::<F>(a, c) + kronecker::<F>(b, c)) * cross
                            + two * delta * kronecker::<F>(a, c) / l2[a]);
                }
            }
            res.push(dl);
        }
        res.push(base.scaled(two));
        res
    }
}

/// Laplace (absolute exponential) covariance `k = σ² exp(-d / ℓ)`.
///
/// The process is not mean square differentiable: derivative terms are
/// evaluated with the distance clamped below at `1e-3 ℓ`, which keeps them
/// finite and makes gradient observations weakly informative.
/// Hyperparameters: `[log ℓ, log σ]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LaplaceCov<F: Float> {
    length: F,
    sigma: F,
}

impl<F: Float> Default for LaplaceCov<F> {
    fn default() -> Self {
        LaplaceCov {
            length: F::one(),
            sigma: F::one(),
        }
    }
}

impl<F: Float> LaplaceCov<F> {
    /// Relative distance below which derivative terms are clamped
    pub const DISTANCE_CLAMP: f64 = 1e-3;

    /// Constructor given the length scale `ℓ > 0` and the amplitude `σ > 0`
    pub fn new(length: F, sigma: F) -> Result<Self> {
        Ok(LaplaceCov {
            length: check_positive("laplace length", length)?,
            sigma: check_positive("laplace sigma", sigma)?,
        })
    }

    /// Length scale
    pub fn length(&self) -> F {
        self.length
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Clamped distance, kernel value at that distance and the radial factors
    /// `ψ1`, `ψ2` such that gradient = `ψ1 r` and hessian = `ψ2 r rᵀ + ψ1 I`.
    fn radial(&self, d: F) -> (F, F, F, F, bool) {
        let l = self.length;
        let floor = F::cast(Self::DISTANCE_CLAMP) * l;
        let clamped = d < floor;
        let de = if clamped { floor } else { d };
        let ke = self.sigma * self.sigma * F::exp(-de / l);
        let psi1 = -ke / (l * de);
        let psi2 = ke / (l * de * de) * (F::one() / l + F::one() / de);
        (de, ke, psi1, psi2, clamped)
    }
}

impl<F: Float> fmt::Display for LaplaceCov<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Laplace(length={}, sigma={})", self.length, self.sigma)
    }
}

impl<F: Float> CovarianceModel<F> for LaplaceCov<F> {
    fn n_hyper(&self) -> usize {
        2
    }

    fn log_hyper(&self) -> Array1<F> {
        Array1::from_vec(vec![self.length.ln(), self.sigma.ln()])
    }

    fn set_log_hyper(&mut self, log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        check_log_hyper(log_hyper, 2)?;
        self.length = log_hyper[0].exp();
        self.sigma = log_hyper[1].exp();
        Ok(())
    }

    fn terms(&self, r: &[F; 3]) -> KernelTerms<F> {
        let d = squared_norm(r).sqrt();
        let (_, _, psi1, psi2, _) = self.radial(d);
        let mut t = KernelTerms::zeros();
        t.value = self.sigma * self.sigma * F::exp(-d / self.length);
        for a in 0..3 {
            t.gradient[a] = psi1 * r[a];
            for b in 0..3 {
                t.hessian[a][b] = psi2 * r[a] * r[b] + psi1 * kronecker::<F>(a, b);
            }
        }
        t
    }

    fn hyper_terms(&self, r: &[F; 3]) -> Vec<KernelTerms<F>> {
        let (two, four) = (F::cast(2.), F::cast(4.));
        let l = self.length;
        let d = squared_norm(r).sqrt();
        let (de, ke, psi1, psi2, clamped) = self.radial(d);

        let (dpsi1, dpsi2) = if clamped {
            // ψ1 ∝ ℓ⁻² and ψ2 ∝ ℓ⁻⁴ once the distance is tied to ℓ
            (-two * psi1, -four * psi2)
        } else {
            let dke = ke * de / l;
            let inv = F::one() / l + F::one() / de;
            (
                -dke / (l * de) + ke / (l * de),
                dke / (l * de * de) * inv
                    - ke / (l * l * de * de)
                    - ke / (l * de * de) * inv,
            )
        };

        let base = self.terms(r);
        let mut dl = KernelTerms::zeros();
        dl.value = base.value * d / l;
        for a in 0..3 {
            dl.gradient[a] = dpsi1 * r[a];
            for b in 0..3 {
                dl.hessian[a][b] = dpsi2 * r[a] * r[b] + dpsi1 * kronecker::<F>(a, b);
            }
        }
        vec![dl, base.scaled(two)]
    }
}
