//! Model building workflow: training set, GP regression, level-set sampling,
//! then atlases over the reconstructed surface.
use crate::config::{CovarianceSpec, ExplorationConfig, GpatlasConfig, PolicySpec};
use crate::errors::{GpatlasError, Result};
use crate::training::TrainingSet;
use gpatlas_atlas::{
    Atlas, ExplorationPolicy, Exploration, Explorer, NearestUnexplored, RandomFrontier,
    SurfaceSampler,
};
use gpatlas_gp::{CovarianceModel, GaussianProcess};
use linfa::prelude::*;
use linfa::ParamGuard;
use log::info;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::time::Instant;

/// Builds surface models from object clouds
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    config: GpatlasConfig,
}

impl ModelBuilder {
    /// Builder with validated settings
    pub fn new(config: GpatlasConfig) -> Result<Self> {
        config.check()?;
        Ok(ModelBuilder { config })
    }

    /// Settings
    pub fn config(&self) -> &GpatlasConfig {
        &self.config
    }

    /// Labelled training points of an object cloud
    pub fn training_set(
        &self,
        cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<TrainingSet> {
        TrainingSet::from_cloud(cloud, &self.config.training)
    }

    /// Thin plate length: the configured one, or the bounding box diagonal of the
    /// training points, which bounds their pairwise distances as the thin plate
    /// kernel requires
    pub fn thin_plate_length(&self, training: &TrainingSet) -> Result<f64> {
        match self.config.gp.covariance {
            CovarianceSpec::ThinPlate {
                length: Some(length),
            } => Ok(length),
            _ => training.diagonal(),
        }
    }

    /// Fit the surface model of `training` with covariance `cov`, then sample
    /// its zero level-set. Nothing is returned unless every step succeeds.
    pub fn build<C: CovarianceModel<f64>>(
        &self,
        training: TrainingSet,
        cov: C,
    ) -> Result<SurfaceModel<C>> {
        let now = Instant::now();
        let params = self.config.gp.params(cov).check()?;
        let gp = params.fit(&Dataset::new(
            training.inputs().to_owned(),
            training.labels().to_owned(),
        ))?;
        info!(
            "{} trained on {} points ({}ms)",
            gp,
            training.len(),
            now.elapsed().as_millis()
        );

        let sampler = SurfaceSampler::from_cloud(&training.object(), self.config.sampler)?;
        let surface_points = sampler.sample(&gp)?;
        Ok(SurfaceModel {
            gp,
            training,
            sampler,
            surface_points,
            config: self.config.clone(),
        })
    }
}

/// A trained implicit surface and points sampled on its zero level-set
#[derive(Clone, Debug)]
pub struct SurfaceModel<C: CovarianceModel<f64>> {
    gp: GaussianProcess<f64, C>,
    training: TrainingSet,
    sampler: SurfaceSampler,
    surface_points: Array2<f64>,
    config: GpatlasConfig,
}

impl<C: CovarianceModel<f64>> SurfaceModel<C> {
    /// Surface regression model
    pub fn gp(&self) -> &GaussianProcess<f64, C> {
        &self.gp
    }

    /// Points the model was first trained on
    pub fn training(&self) -> &TrainingSet {
        &self.training
    }

    /// Grid points found near the zero level-set (m, 3)
    pub fn surface_points(&self) -> &Array2<f64> {
        &self.surface_points
    }

    /// Empty atlas over the model
    pub fn atlas(&self) -> Atlas<'_> {
        Atlas::new(&self.gp, self.config.atlas)
    }

    fn pick_surface_point<R: Rng>(&self, rng: &mut R) -> Result<Array1<f64>> {
        if self.surface_points.nrows() == 0 {
            return Err(GpatlasError::InvalidValueError(
                "no surface point was sampled, the sampler tolerance may be too tight".to_string(),
            ));
        }
        let i = rng.gen_range(0..self.surface_points.nrows());
        Ok(self.surface_points.row(i).to_owned())
    }

    /// Atlas of `n_charts` unconnected charts centered on randomly picked
    /// surface points
    pub fn seed_atlas(&self, n_charts: usize, seed: u64) -> Result<Atlas<'_>> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let mut atlas = self.atlas();
        for _ in 0..n_charts {
            let center = self.pick_surface_point(&mut rng)?;
            atlas.create_node(&center)?;
        }
        info!("atlas seeded with {} charts", atlas.count_nodes());
        Ok(atlas)
    }

    /// Grow `atlas` by at most `n_charts` charts from a random surface point,
    /// following the configured exploration policy
    pub fn explore<'m>(
        &'m self,
        atlas: Atlas<'m>,
        n_charts: usize,
        seed: u64,
    ) -> Result<(Atlas<'m>, Exploration)> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let start = self.pick_surface_point(&mut rng)?;
        let ExplorationConfig {
            policy,
            variance_threshold,
        } = &self.config.exploration;
        match policy {
            PolicySpec::RandomFrontier => {
                let policy = RandomFrontier::new_with_rng(*variance_threshold, rng);
                grow(atlas, policy, &start, n_charts)
            }
            PolicySpec::NearestUnexplored { n_candidates } => {
                let policy = NearestUnexplored::new(*variance_threshold, *n_candidates)?;
                grow(atlas, policy, &start, n_charts)
            }
        }
    }

    /// Add surface points (label 0) observed after training, then resample the
    /// level-set. Atlases built before the update have to be rebuilt.
    pub fn update(&mut self, points: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<()> {
        let now = Instant::now();
        let labels = Array1::from_elem(points.nrows(), self.config.training.surface_label);
        self.gp.add_patterns(points, &labels)?;
        self.gp.compute()?;
        self.surface_points = self.sampler.sample(&self.gp)?;
        info!(
            "model updated with {} points: {} ({}ms)",
            points.nrows(),
            self.gp,
            now.elapsed().as_millis()
        );
        Ok(())
    }
}

fn grow<'m, P: ExplorationPolicy>(
    atlas: Atlas<'m>,
    policy: P,
    start: &Array1<f64>,
    n_charts: usize,
) -> Result<(Atlas<'m>, Exploration)> {
    let max_nodes = atlas.count_nodes() + n_charts;
    let mut explorer = Explorer::new(atlas, policy);
    let exploration = explorer.explore(start, max_nodes)?;
    Ok((explorer.into_atlas(), exploration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::sphere_cloud;
    use approx::assert_abs_diff_eq;
    use gpatlas_atlas::{project, Convergence, ImplicitSurface, ProjectionParams, SamplerParams};
    use gpatlas_gp::ThinPlateCov;
    use ndarray::array;

    fn test_config() -> GpatlasConfig {
        GpatlasConfig {
            sampler: SamplerParams {
                step: 0.01,
                tolerance: 1e-2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sphere_model() -> SurfaceModel<ThinPlateCov<f64>> {
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 8, 6, false);
        let builder = ModelBuilder::new(test_config()).unwrap();
        let training = builder.training_set(&cloud).unwrap();
        let length = builder.thin_plate_length(&training).unwrap();
        assert_abs_diff_eq!(length, training.diagonal().unwrap());
        builder
            .build(training, ThinPlateCov::new(length).unwrap())
            .unwrap()
    }

    #[test]
    fn test_sphere_surface_model() {
        let model = sphere_model();
        let gp = model.gp();
        let training = model.training();
        assert_eq!(gp.n_samples(), 97);

        let centroid = training.centroid();
        assert!(gp.f(&centroid).unwrap()[0] < 0.);
        for p in training.shell().rows() {
            assert!(gp.f(&p).unwrap()[0] > 0.);
        }
        for p in training.object().rows() {
            assert_abs_diff_eq!(gp.f(&p).unwrap()[0], 0., epsilon = 1e-2);
        }
        // off training points
        assert!(gp.f(&array![0.03, 0., 1.]).unwrap()[0] < 0.);
        assert!(gp.f(&array![0., 0.1, 1.]).unwrap()[0] > 0.);
        assert!(gp.f(&array![0., 0., 1.2]).unwrap()[0] > 0.);
    }

    #[test]
    fn test_level_set_sampling() {
        let model = sphere_model();
        let points = model.surface_points();
        assert!(points.nrows() > 10);
        for p in points.rows() {
            let r = (&p - &array![0., 0., 1.]).mapv(|v| v * v).sum().sqrt();
            assert!((r - 0.06).abs() < 5e-3, "level-set point at radius {r}");
            assert!(model.gp().value(p).unwrap().abs() <= 1e-2);
        }
    }

    #[test]
    fn test_seed_atlas() {
        let model = sphere_model();
        let atlas = model.seed_atlas(5, 42).unwrap();
        assert_eq!(atlas.count_nodes(), 5);
        for chart in atlas.charts() {
            assert!(model.gp().value(chart.center().view()).unwrap().abs() < 1e-2);
            let radial = chart.center() - &array![0., 0., 1.];
            let radial = &radial / radial.dot(&radial).sqrt();
            assert!(chart.normal().dot(&radial) > 0.99);
            assert!(atlas.get_connections(chart.id()).unwrap().is_empty());
        }
        let again = model.seed_atlas(5, 42).unwrap();
        assert_eq!(again.charts(), atlas.charts());
    }

    #[test]
    fn test_explore_sphere() {
        let model = sphere_model();
        let atlas = model.seed_atlas(2, 0).unwrap();
        let (atlas, exploration) = model.explore(atlas, 4, 1).unwrap();
        assert!(exploration.path.len() <= 4);
        assert_eq!(exploration.path[0], 2);
        assert_eq!(atlas.count_nodes(), 2 + exploration.path.len());
        for w in exploration.path.windows(2) {
            assert_eq!(atlas.get_connections(w[0]).unwrap(), &[w[1]]);
        }
    }

    #[test]
    fn test_project_runaway_walk_on_model() {
        let model = sphere_model();
        let start = array![0.2, 0., 1.];
        let f0 = model.gp().value(start.view()).unwrap();
        assert!(f0 > 1.);
        // stepping along -x from outside walks away from the surface
        let res = project(
            model.gp(),
            &start,
            &array![-1., 0., 0.],
            &ProjectionParams::default(),
        )
        .unwrap();
        assert_eq!(res.convergence, Convergence::Diverged);
        assert!(res.point.iter().all(|v| v.is_finite()));
        assert!(res.residual.abs() <= f0);
        assert_abs_diff_eq!(
            model.gp().value(res.point.view()).unwrap(),
            res.residual,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_update_model() {
        let mut model = sphere_model();
        let poles = array![[0., 0., 1.06], [0., 0., 0.94]];
        model.update(&poles).unwrap();
        assert_eq!(model.gp().n_samples(), 99);
        for p in poles.rows() {
            assert_abs_diff_eq!(model.gp().f(&p).unwrap()[0], 0., epsilon = 1e-4);
        }
        assert!(model.surface_points().nrows() > 10);
    }

    #[test]
    fn test_configured_thin_plate_length() {
        let mut config = test_config();
        config.gp.covariance = CovarianceSpec::ThinPlate { length: Some(0.7) };
        let builder = ModelBuilder::new(config).unwrap();
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 8, 6, false);
        let training = builder.training_set(&cloud).unwrap();
        assert_abs_diff_eq!(builder.thin_plate_length(&training).unwrap(), 0.7);
    }

    #[test]
    fn test_build_failure() {
        // too short thin plate length for the training set spread
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 8, 6, false);
        let builder = ModelBuilder::new(test_config()).unwrap();
        let training = builder.training_set(&cloud).unwrap();
        let res = builder.build(training, ThinPlateCov::new(0.05).unwrap());
        assert!(matches!(res, Err(GpatlasError::GpError(_))));
    }
}
