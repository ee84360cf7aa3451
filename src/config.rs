//! Settings of the whole surface modelling workflow, loadable from json.
use crate::errors::{GpatlasError, Result};
use gpatlas_atlas::{AtlasParams, SamplerParams};
use gpatlas_gp::{
    CovarianceModel, GpParams, RpropParams, GP_GRADIENT_NOISE, GP_INITIAL_CAPACITY, GP_NOISE,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Covariance family and its hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CovarianceSpec {
    /// Thin plate spline, `length` defaults to the training set bounding box diagonal
    ThinPlate {
        /// Length hyperparameter
        #[serde(default)]
        length: Option<f64>,
    },
    /// Squared exponential
    SquaredExponential {
        /// Length scale
        length: f64,
        /// Standard deviation
        sigma: f64,
    },
    /// Squared exponential with one length scale per axis
    SquaredExponentialArd {
        /// Length scales
        lengths: [f64; 3],
        /// Standard deviation
        sigma: f64,
    },
    /// Laplace (exponential) covariance
    Laplace {
        /// Length scale
        length: f64,
        /// Standard deviation
        sigma: f64,
    },
}

impl Default for CovarianceSpec {
    fn default() -> Self {
        CovarianceSpec::ThinPlate { length: None }
    }
}

/// GP regression settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpConfig {
    /// Covariance model
    pub covariance: CovarianceSpec,
    /// Rows allocated for the augmented Cholesky factor on first use
    pub initial_capacity: usize,
    /// Variance of value observations
    pub noise: f64,
    /// Variance of gradient observations
    pub gradient_noise: f64,
    /// Tune hyperparameters by likelihood maximization
    pub optimise: bool,
    /// Likelihood maximization settings
    pub rprop: RpropParams<f64>,
}

impl Default for GpConfig {
    fn default() -> Self {
        GpConfig {
            covariance: CovarianceSpec::default(),
            initial_capacity: GP_INITIAL_CAPACITY,
            noise: GP_NOISE,
            gradient_noise: GP_GRADIENT_NOISE,
            optimise: false,
            rprop: RpropParams::default(),
        }
    }
}

impl GpConfig {
    /// GP parameters with these settings and the given covariance model
    pub fn params<C: CovarianceModel<f64>>(&self, cov: C) -> GpParams<f64, C> {
        GpParams::new(cov)
            .initial_capacity(self.initial_capacity)
            .noise(self.noise)
            .gradient_noise(self.gradient_noise)
            .optimise(self.optimise)
            .rprop(self.rprop)
    }
}

/// Labels and reference shell of the training set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Radius of the sphere of outside points around the object centroid
    pub outer_radius: f64,
    /// Angular divisions of the outside sphere
    pub ang_div: usize,
    /// Divisions of the outside sphere diameter
    pub lin_div: usize,
    /// Label of the object centroid
    pub inside_label: f64,
    /// Label of object points
    pub surface_label: f64,
    /// Label of the outside sphere points
    pub outside_label: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            outer_radius: 0.15,
            ang_div: 8,
            lin_div: 6,
            inside_label: -1.,
            surface_label: 0.,
            outside_label: 1.,
        }
    }
}

/// Exploration strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PolicySpec {
    /// Random point of the chart rim
    RandomFrontier,
    /// Rim point of largest variance not yet covered
    NearestUnexplored {
        /// Rim candidates per chart
        n_candidates: usize,
    },
}

/// Exploration settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Exploration strategy
    pub policy: PolicySpec,
    /// Charts with a variance above this value end the exploration
    pub variance_threshold: f64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        ExplorationConfig {
            policy: PolicySpec::RandomFrontier,
            variance_threshold: 1e-2,
        }
    }
}

/// All settings, every field defaults when missing from the json file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpatlasConfig {
    /// GP regression
    pub gp: GpConfig,
    /// Training set construction
    pub training: TrainingConfig,
    /// Level-set sampling
    pub sampler: SamplerParams,
    /// Atlas charts
    pub atlas: AtlasParams,
    /// Atlas exploration
    pub exploration: ExplorationConfig,
}

impl GpatlasConfig {
    /// Load settings from a json file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: GpatlasConfig = serde_json::from_reader(BufReader::new(file))?;
        config.check()?;
        Ok(config)
    }

    /// Check settings consistency beyond what each component validates
    pub fn check(&self) -> Result<()> {
        let t = &self.training;
        if !(t.outer_radius > 0. && t.outer_radius.is_finite()) {
            return Err(GpatlasError::InvalidConfigError(format!(
                "outer radius should be positive, got {}",
                t.outer_radius
            )));
        }
        if t.ang_div == 0 || t.lin_div == 0 {
            return Err(GpatlasError::InvalidConfigError(
                "outside sphere divisions should be at least 1".to_string(),
            ));
        }
        if let CovarianceSpec::ThinPlate {
            length: Some(length),
        } = self.gp.covariance
        {
            if !(length > 0.) {
                return Err(GpatlasError::InvalidConfigError(format!(
                    "thin plate length should be positive, got {length}"
                )));
            }
        }
        if let PolicySpec::NearestUnexplored { n_candidates: 0 } = self.exploration.policy {
            return Err(GpatlasError::InvalidConfigError(
                "nearest unexplored policy needs at least one candidate".to_string(),
            ));
        }
        Ok(())
    }
}
