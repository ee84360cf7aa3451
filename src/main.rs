use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Env};
use gpatlas::cloud::{load_cloud, sphere_cloud};
use gpatlas::{AtlasReport, CovarianceSpec, GpatlasConfig, ModelBuilder, TrainingSet, GPATLAS_LOG};
use gpatlas_gp::{
    CovarianceModel, LaplaceCov, SquaredExponentialArdCov, SquaredExponentialCov, ThinPlateCov,
};
use log::info;
use std::path::PathBuf;

/// Reconstruct an object surface from a point cloud and build an atlas on it
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Object cloud: `sphere`, `half_sphere` or a (n, 3) `.npy` file
    #[arg(long, default_value = "sphere")]
    cloud: String,
    /// Json settings file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of seeded charts
    #[arg(long, default_value_t = 20)]
    charts: usize,
    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of charts grown by exploration
    #[arg(long, default_value_t = 0)]
    explore: usize,
    /// Json atlas report
    #[arg(long, default_value = "atlas.json")]
    output: PathBuf,
}

const SPHERE_RADIUS: f64 = 0.06;
const SPHERE_CENTER: [f64; 3] = [0., 0., 1.];
const SPHERE_ANG_DIV: usize = 24;
const SPHERE_LIN_DIV: usize = 20;

fn run<C: CovarianceModel<f64>>(
    builder: &ModelBuilder,
    training: TrainingSet,
    cov: C,
    args: &Args,
) -> anyhow::Result<()> {
    let model = builder.build(training, cov)?;
    info!("{} surface points sampled", model.surface_points().nrows());

    let atlas = model.seed_atlas(args.charts, args.seed)?;
    let report = if args.explore > 0 {
        let (atlas, exploration) = model.explore(atlas, args.explore, args.seed)?;
        AtlasReport::new(&atlas, Some(&exploration))
    } else {
        AtlasReport::new(&atlas, None)
    };
    report
        .save(&args.output)
        .with_context(|| format!("cannot write atlas report {}", args.output.display()))?;
    info!(
        "atlas of {} charts written to {}",
        report.charts.len(),
        args.output.display()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let env = Env::new().filter_or(GPATLAS_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => GpatlasConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => GpatlasConfig::default(),
    };
    let cloud = match args.cloud.as_str() {
        "sphere" => sphere_cloud(SPHERE_RADIUS, SPHERE_CENTER, SPHERE_ANG_DIV, SPHERE_LIN_DIV, false),
        "half_sphere" => sphere_cloud(SPHERE_RADIUS, SPHERE_CENTER, SPHERE_ANG_DIV, SPHERE_LIN_DIV, true),
        path => load_cloud(path).with_context(|| format!("cannot load cloud {path}"))?,
    };
    info!("object cloud of {} points", cloud.nrows());

    let builder = ModelBuilder::new(config)?;
    let training = builder.training_set(&cloud)?;
    match builder.config().gp.covariance.clone() {
        CovarianceSpec::ThinPlate { .. } => {
            let length = builder.thin_plate_length(&training)?;
            info!("thin plate length {length}");
            run(&builder, training, ThinPlateCov::new(length)?, &args)
        }
        CovarianceSpec::SquaredExponential { length, sigma } => run(
            &builder,
            training,
            SquaredExponentialCov::new(length, sigma)?,
            &args,
        ),
        CovarianceSpec::SquaredExponentialArd { lengths, sigma } => run(
            &builder,
            training,
            SquaredExponentialArdCov::new(lengths, sigma)?,
            &args,
        ),
        CovarianceSpec::Laplace { length, sigma } => {
            run(&builder, training, LaplaceCov::new(length, sigma)?, &args)
        }
    }
}
