use crate::covariance_models::{difference, CovarianceModel};
use crate::errors::{GpError, Result};
use crate::optimization::{LikelihoodModel, Rprop, RpropResult};
use crate::parameters::{GpParams, GpValidParams};
use crate::sample_set::{SampleSet, INPUT_DIM, N_CHANNELS};
use crate::utils::{compute_tangent_basis, normalized, GrowableMatrix};

use linfa::prelude::{DatasetBase, Fit, Float};
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};

use log::debug;
use rayon::prelude::*;
use std::fmt;
use std::ops::Range;
use std::time::Instant;

/// Posterior quantities at a single query point
#[derive(Clone, Debug, PartialEq)]
pub struct PointEvaluation<F: Float> {
    /// Posterior mean of f
    pub value: F,
    /// Posterior variance of f
    pub variance: F,
    /// Unit normal, i.e. normalized posterior mean gradient
    pub normal: Array1<F>,
    /// First tangent vector
    pub tangent_x: Array1<F>,
    /// Second tangent vector
    pub tangent_y: Array1<F>,
}

/// Posterior quantities at a batch of query points, one row per point
#[derive(Clone, Debug, PartialEq)]
pub struct BatchEvaluation<F: Float> {
    /// Posterior means (n,)
    pub values: Array1<F>,
    /// Posterior variances (n,)
    pub variances: Array1<F>,
    /// Unit normals (n, 3)
    pub normals: Array2<F>,
    /// First tangent vectors (n, 3)
    pub tangents_x: Array2<F>,
    /// Second tangent vectors (n, 3)
    pub tangents_y: Array2<F>,
}

/// Gaussian process regression of an implicit function `f: R³ -> R` observed
/// through values and gradients.
///
/// Each training sample contributes 4 observations (f, ∂f/∂x, ∂f/∂y, ∂f/∂z). The
/// augmented 4n x 4n kernel matrix is ordered sample by sample so that adding
/// samples appends rows: its lower Cholesky factor `L` is then extended by blocks
/// instead of being refactorized.
///
/// Model caches follow two flags:
/// * the kernel is dirty when hyperparameters changed, `L` has to be rebuilt (O(n³)),
/// * `alpha = K⁻¹y` is stale whenever samples or hyperparameters changed (O(n²)).
///
/// [`GaussianProcess::compute`] refreshes whatever is needed; evaluations fail with
/// [`GpError::UninitializedError`] until it is called.
///
/// # Example
///
/// ```
/// use gpatlas_gp::{GaussianProcess, ThinPlateCov};
/// use linfa::prelude::*;
/// use ndarray::array;
///
/// // centroid inside, points on the surface, one point outside
/// let xt = array![
///     [0., 0., 0.],
///     [0.1, 0., 0.],
///     [0., 0.1, 0.],
///     [0., 0., 0.1],
///     [0.3, 0., 0.]
/// ];
/// let yt = array![-1., 0., 0., 0., 1.];
///
/// let gp = GaussianProcess::<f64, ThinPlateCov<f64>>::params(ThinPlateCov::new(0.5).unwrap())
///     .noise(1e-6)
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fit error");
///
/// // value and gradient at a query point
/// let fx = gp.f(&array![0.05, 0., 0.]).expect("GP evaluation error");
/// assert_eq!(fx.len(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct GaussianProcess<F: Float, Cov: CovarianceModel<F>> {
    /// Parameters used to build the model
    params: GpValidParams<F, Cov>,
    /// Covariance model with current hyperparameters
    cov: Cov,
    /// Training samples
    samples: SampleSet<F>,
    /// Lower Cholesky factor of the augmented kernel matrix
    l_factor: GrowableMatrix<F>,
    /// Solution of K alpha = y
    alpha: Array1<F>,
    kernel_dirty: bool,
    alpha_stale: bool,
}

impl<F: Float, Cov: CovarianceModel<F>> fmt::Display for GaussianProcess<F, Cov> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP({}, noise={}, gradient_noise={}, samples={})",
            self.cov,
            self.params.noise,
            self.params.gradient_noise,
            self.samples.len()
        )
    }
}

impl<F: Float, Cov: CovarianceModel<F>> GaussianProcess<F, Cov> {
    /// Gp parameters constructor
    pub fn params<NewCov: CovarianceModel<F>>(cov: NewCov) -> GpParams<F, NewCov> {
        GpParams::new(cov)
    }

    /// Empty model. Samples are added with [`GaussianProcess::add_patterns`].
    pub fn new(params: GpValidParams<F, Cov>) -> Self {
        GaussianProcess {
            cov: params.cov,
            l_factor: GrowableMatrix::new(params.initial_capacity),
            samples: SampleSet::new(),
            alpha: Array1::zeros(0),
            kernel_dirty: false,
            alpha_stale: false,
            params,
        }
    }

    /// Covariance model with current hyperparameters
    pub fn covariance(&self) -> &Cov {
        &self.cov
    }

    /// Parameters the model was built with
    pub fn params_used(&self) -> &GpValidParams<F, Cov> {
        &self.params
    }

    /// Training samples
    pub fn samples(&self) -> &SampleSet<F> {
        &self.samples
    }

    /// Number of training samples
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Value observation noise
    pub fn noise(&self) -> F {
        self.params.noise
    }

    /// Gradient observation noise
    pub fn gradient_noise(&self) -> F {
        self.params.gradient_noise
    }

    /// Whether caches are valid for the current samples and hyperparameters
    pub fn is_ready(&self) -> bool {
        !self.samples.is_empty() && !self.kernel_dirty && !self.alpha_stale
    }

    /// Lower Cholesky factor of the augmented kernel matrix (4n x 4n)
    pub fn cholesky_factor(&self) -> Result<Array2<F>> {
        self.check_ready()?;
        Ok(self.l_factor.view().to_owned())
    }

    /// Add samples with zero gradient targets.
    ///
    /// The first batch factorizes the augmented kernel matrix, later batches
    /// extend the factor by blocks. The mean cache is left stale until
    /// [`GaussianProcess::compute`] is called.
    pub fn add_patterns(
        &mut self,
        inputs: &ArrayBase<impl Data<Elem = F>, Ix2>,
        labels: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<()> {
        let n_old = self.samples.len();
        self.samples.add(inputs, labels)?;
        self.update_factor(n_old)
    }

    /// Add samples with explicit gradient targets (e.g. surface normals).
    pub fn add_patterns_with_gradients(
        &mut self,
        inputs: &ArrayBase<impl Data<Elem = F>, Ix2>,
        labels: &ArrayBase<impl Data<Elem = F>, Ix1>,
        gradients: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<()> {
        let n_old = self.samples.len();
        self.samples.add_with_gradients(inputs, labels, gradients)?;
        self.update_factor(n_old)
    }

    fn update_factor(&mut self, n_old: usize) -> Result<()> {
        if self.samples.len() == n_old {
            return Ok(());
        }
        self.alpha_stale = true;
        let res = if n_old == 0 || self.kernel_dirty {
            self.factorize()
        } else {
            self.extend_factor(n_old)
        };
        if res.is_err() {
            self.kernel_dirty = true;
        }
        res
    }

    /// Refresh the model caches: rebuild the Cholesky factor when hyperparameters
    /// changed, then solve for `alpha` when samples or hyperparameters changed.
    pub fn compute(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            return Ok(());
        }
        if self.kernel_dirty {
            self.factorize()?;
        }
        if self.alpha_stale {
            let now = Instant::now();
            let y = self.samples.targets().insert_axis(Axis(1));
            let l = self.l_factor.view();
            let z = l.solve_triangular(&y, UPLO::Lower)?;
            let alpha = l.t().solve_triangular(&z, UPLO::Upper)?;
            self.alpha = alpha.index_axis_move(Axis(1), 0);
            self.alpha_stale = false;
            debug!("alpha update: {}ms", now.elapsed().as_millis());
        }
        Ok(())
    }

    /// Augmented kernel matrix between samples of `rows` and samples of `cols`.
    /// Noise is added on the diagonal when `rows == cols`.
    fn kernel_matrix(&self, rows: Range<usize>, cols: Range<usize>) -> Array2<F> {
        let x = self.samples.inputs();
        let mut k = Array2::zeros((N_CHANNELS * rows.len(), N_CHANNELS * cols.len()));
        Zip::indexed(k.rows_mut()).par_for_each(|p, mut row| {
            let (i, a) = (rows.start + p / N_CHANNELS, p % N_CHANNELS);
            for (q, j) in cols.clone().enumerate() {
                let t = self.cov.terms(&difference(&x.row(i), &x.row(j)));
                let mut cells = row.slice_mut(s![N_CHANNELS * q..N_CHANNELS * (q + 1)]);
                if a == 0 {
                    cells[0] = t.value;
                    for b in 0..INPUT_DIM {
                        cells[b + 1] = -t.gradient[b];
                    }
                } else {
                    cells[0] = t.gradient[a - 1];
                    for b in 0..INPUT_DIM {
                        cells[b + 1] = -t.hessian[a - 1][b];
                    }
                }
            }
        });
        if rows == cols {
            for (p, v) in k.diag_mut().iter_mut().enumerate() {
                *v += if p % N_CHANNELS == 0 {
                    self.params.noise
                } else {
                    self.params.gradient_noise
                };
            }
        }
        k
    }

    /// Full O(n³) factorization of the augmented kernel matrix
    fn factorize(&mut self) -> Result<()> {
        let now = Instant::now();
        let n = self.samples.len();
        let k = self.kernel_matrix(0..n, 0..n);
        let l = k
            .cholesky()
            .map_err(|err| GpError::from_factorization(err, "augmented kernel matrix"))?;
        self.l_factor.assign(&lower_triangle(l));
        self.kernel_dirty = false;
        self.alpha_stale = true;
        debug!(
            "full factorization of {} samples: {}ms",
            n,
            now.elapsed().as_millis()
        );
        Ok(())
    }

    /// Block extension of the factor with the samples from `n_old` on:
    /// `L21ᵀ = L11⁻¹ K12` and `L22 = chol(K22 - L21 L21ᵀ)`.
    fn extend_factor(&mut self, n_old: usize) -> Result<()> {
        let now = Instant::now();
        let n = self.samples.len();
        let m_old = N_CHANNELS * n_old;
        let k12 = self.kernel_matrix(0..n_old, n_old..n);
        let k22 = self.kernel_matrix(n_old..n, n_old..n);

        let l21t = self.l_factor.view().solve_triangular(&k12, UPLO::Lower)?;
        let schur = k22 - l21t.t().dot(&l21t);
        let l22 = schur
            .cholesky()
            .map_err(|err| GpError::from_factorization(err, "schur complement"))?;

        self.l_factor.resize(N_CHANNELS * n);
        let mut l = self.l_factor.view_mut();
        l.slice_mut(s![m_old.., ..m_old]).assign(&l21t.t());
        l.slice_mut(s![m_old.., m_old..]).assign(&lower_triangle(l22));
        debug!(
            "incremental factorization {} -> {} samples: {}ms",
            n_old,
            n,
            now.elapsed().as_millis()
        );
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(GpError::InvalidValueError(
                "GP has no training sample".to_string(),
            ));
        }
        if self.kernel_dirty || self.alpha_stale {
            return Err(GpError::UninitializedError(
                "GP caches are stale, compute() should be called".to_string(),
            ));
        }
        Ok(())
    }

    /// Cross covariance between training observations and `(f, ∇f)(x)`, shape (4n, 4)
    fn cross_covariance(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        let mut ks = Array2::zeros((N_CHANNELS * self.samples.len(), N_CHANNELS));
        for (i, xi) in self.samples.inputs().rows().into_iter().enumerate() {
            ks.slice_mut(s![N_CHANNELS * i..N_CHANNELS * (i + 1), ..])
                .assign(&self.cov.block(&xi, x));
        }
        ks
    }

    /// Posterior mean of `(f, ∂f/∂x, ∂f/∂y, ∂f/∂z)` at `x`.
    /// Fails when there is no training sample or caches are stale.
    pub fn f(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Array1<F>> {
        check_query(x)?;
        self.check_ready()?;
        Ok(self.cross_covariance(x).t().dot(&self.alpha))
    }

    /// Posterior variance of f at `x`, zero when there is no training sample.
    pub fn var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        check_query(x)?;
        if self.samples.is_empty() {
            return Ok(F::zero());
        }
        self.check_ready()?;
        let ks = self.cross_covariance(x);
        let v = self
            .l_factor
            .view()
            .solve_triangular(&ks.slice(s![.., 0..1]), UPLO::Lower)?;
        Ok(clamp_variance(self.cov.self_covariance() - sum_of_squares(&v)))
    }

    /// Posterior covariance of `(f, ∂f/∂x, ∂f/∂y, ∂f/∂z)` at `x` (4x4),
    /// zero when there is no training sample.
    pub fn posterior_covariance(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array2<F>> {
        check_query(x)?;
        if self.samples.is_empty() {
            return Ok(Array2::zeros((N_CHANNELS, N_CHANNELS)));
        }
        self.check_ready()?;
        let ks = self.cross_covariance(x);
        let v = self.l_factor.view().solve_triangular(&ks, UPLO::Lower)?;
        let mut cov = self.cov.block(x, x) - v.t().dot(&v);
        cov.diag_mut().mapv_inplace(clamp_variance);
        Ok(cov)
    }

    /// Value, variance, normal and tangent basis at `x`
    pub fn evaluate(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<PointEvaluation<F>> {
        check_query(x)?;
        self.check_ready()?;
        let ks = self.cross_covariance(x);
        let mean = ks.t().dot(&self.alpha);
        let v = self
            .l_factor
            .view()
            .solve_triangular(&ks.slice(s![.., 0..1]), UPLO::Lower)?;
        let variance =
            clamp_variance(self.cov.self_covariance() - sum_of_squares(&v));
        let normal = normalized(&mean.slice(s![1..]))?;
        let (tangent_x, tangent_y) = compute_tangent_basis(&normal)?;
        Ok(PointEvaluation {
            value: mean[0],
            variance,
            normal,
            tangent_x,
            tangent_y,
        })
    }

    /// Evaluate a batch of points (n, 3) in parallel
    pub fn evaluate_batch(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<BatchEvaluation<F>> {
        if x.ncols() != INPUT_DIM {
            return Err(GpError::InvalidValueError(format!(
                "query points should be {}D, got {} columns",
                INPUT_DIM,
                x.ncols()
            )));
        }
        self.check_ready()?;
        let x = x.view();
        let evals = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.evaluate(&x.row(i)))
            .collect::<Result<Vec<_>>>()?;

        let n = evals.len();
        let mut res = BatchEvaluation {
            values: Array1::zeros(n),
            variances: Array1::zeros(n),
            normals: Array2::zeros((n, INPUT_DIM)),
            tangents_x: Array2::zeros((n, INPUT_DIM)),
            tangents_y: Array2::zeros((n, INPUT_DIM)),
        };
        for (i, e) in evals.into_iter().enumerate() {
            res.values[i] = e.value;
            res.variances[i] = e.variance;
            res.normals.row_mut(i).assign(&e.normal);
            res.tangents_x.row_mut(i).assign(&e.tangent_x);
            res.tangents_y.row_mut(i).assign(&e.tangent_y);
        }
        Ok(res)
    }

    /// Posterior means of f at a batch of points (n, 3), computed in parallel
    pub fn predict_values(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        self.check_ready()?;
        let x = x.view();
        let values = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.f(&x.row(i)).map(|fx| fx[0]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from_vec(values))
    }

    /// Log marginal likelihood of the augmented observations
    /// `-½ yᵀα - Σ log L_ii - ½ 4n log 2π`
    pub fn log_likelihood(&self) -> Result<F> {
        self.check_ready()?;
        let y = self.samples.targets();
        let log_det = self
            .l_factor
            .view()
            .diag()
            .fold(F::zero(), |acc, v| acc + v.ln());
        let half = F::cast(0.5);
        Ok(-half * y.dot(&self.alpha)
            - log_det
            - half * F::cast(y.len()) * F::cast(2. * std::f64::consts::PI).ln())
    }

    /// Gradient of the log marginal likelihood with respect to log hyperparameters
    /// `½ tr((ααᵀ - K⁻¹) ∂K/∂θ)`
    pub fn log_likelihood_gradient(&self) -> Result<Array1<F>> {
        self.check_ready()?;
        let now = Instant::now();
        let n = self.samples.len();
        let m = N_CHANNELS * n;
        let l = self.l_factor.view();
        let l_inv = l.solve_triangular(&Array2::<F>::eye(m), UPLO::Lower)?;
        let alpha = self.alpha.view().insert_axis(Axis(1));
        let w = alpha.dot(&alpha.t()) - l_inv.t().dot(&l_inv);

        let x = self.samples.inputs();
        let n_hyper = self.cov.n_hyper();
        let grad = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut g = Array1::<F>::zeros(n_hyper);
                for j in 0..n {
                    let wb = w.slice(s![
                        N_CHANNELS * i..N_CHANNELS * (i + 1),
                        N_CHANNELS * j..N_CHANNELS * (j + 1)
                    ]);
                    for (h, db) in self.cov.hyper_blocks(&x.row(i), &x.row(j)).iter().enumerate() {
                        g[h] += (&wb * db).sum();
                    }
                }
                g
            })
            .collect::<Vec<_>>()
            .into_iter()
            .fold(Array1::<F>::zeros(n_hyper), |acc, g| acc + g);
        debug!("likelihood gradient: {}ms", now.elapsed().as_millis());
        Ok(grad.mapv(|v| v * F::cast(0.5)))
    }

    /// Current log hyperparameters of the covariance model
    pub fn log_hyper(&self) -> Array1<F> {
        self.cov.log_hyper()
    }

    /// Set log hyperparameters of the covariance model. The kernel becomes dirty:
    /// [`GaussianProcess::compute`] will refactorize it.
    pub fn set_log_hyper(
        &mut self,
        log_hyper: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<()> {
        self.cov.set_log_hyper(log_hyper)?;
        self.kernel_dirty = true;
        self.alpha_stale = true;
        Ok(())
    }

    /// Tune hyperparameters by maximizing the log likelihood with RProp
    pub fn optimize(&mut self) -> Result<RpropResult<F>> {
        if self.samples.is_empty() {
            return Err(GpError::InvalidValueError(
                "GP has no training sample to optimize on".to_string(),
            ));
        }
        self.compute()?;
        let rprop = Rprop::new(self.params.rprop);
        rprop.maximize(self)
    }
}

impl<F: Float, Cov: CovarianceModel<F>> LikelihoodModel<F> for GaussianProcess<F, Cov> {
    fn current_log_hyper(&self) -> Array1<F> {
        self.log_hyper()
    }

    fn update_log_hyper(&mut self, log_hyper: &Array1<F>) -> Result<()> {
        self.set_log_hyper(log_hyper)?;
        self.compute()
    }

    fn likelihood(&self) -> Result<F> {
        self.log_likelihood()
    }

    fn likelihood_gradient(&self) -> Result<Array1<F>> {
        self.log_likelihood_gradient()
    }
}

impl<F: Float, Cov: CovarianceModel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GpValidParams<F, Cov>
{
    type Object = GaussianProcess<F, Cov>;

    /// Fit GP on the dataset, tuning hyperparameters when optimisation is enabled
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let now = Instant::now();
        let mut gp = GaussianProcess::new(self.clone());
        gp.add_patterns(dataset.records(), dataset.targets())?;
        gp.compute()?;
        if self.optimise {
            gp.optimize()?;
        }
        debug!("GP fit: {} ({}ms)", gp, now.elapsed().as_millis());
        Ok(gp)
    }
}

fn lower_triangle<F: Float>(mut l: Array2<F>) -> Array2<F> {
    for i in 0..l.nrows() {
        l.slice_mut(s![i, i + 1..]).fill(F::zero());
    }
    l
}

fn sum_of_squares<F: Float>(v: &Array2<F>) -> F {
    v.fold(F::zero(), |acc, e| acc + *e * *e)
}

fn clamp_variance<F: Float>(v: F) -> F {
    if v < F::zero() {
        F::zero()
    } else {
        v
    }
}

fn check_query<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
    if x.len() != INPUT_DIM || x.iter().any(|v| !v.is_finite()) {
        return Err(GpError::InvalidValueError(format!(
            "query should be a finite {INPUT_DIM}D point, got {x}"
        )));
    }
    Ok(())
}
