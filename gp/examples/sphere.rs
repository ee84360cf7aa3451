use gpatlas_gp::{GaussianProcess, ThinPlateCov};
use linfa::prelude::*;
use ndarray::{array, Array1, Array2, Axis};
use std::f64::consts::PI;

/// Points on a sphere of given radius, `n_lat` latitudes x `n_long` longitudes
fn sphere(radius: f64, n_lat: usize, n_long: usize) -> Array2<f64> {
    let mut pts = Array2::zeros((n_lat * n_long, 3));
    for i in 0..n_lat {
        let theta = PI * (i as f64 + 0.5) / n_lat as f64;
        for j in 0..n_long {
            let phi = 2. * PI * j as f64 / n_long as f64;
            pts.row_mut(i * n_long + j).assign(&array![
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos()
            ]);
        }
    }
    pts
}

fn main() {
    let env = env_logger::Env::new().filter_or("GPATLAS_LOG", "debug");
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .init();

    let surface = sphere(0.06, 6, 8);
    let shell = sphere(0.15, 6, 8);
    let centroid = array![[0., 0., 0.]];
    let xt = ndarray::concatenate![Axis(0), centroid, surface, shell];
    let mut yt = Array1::zeros(xt.nrows());
    yt[0] = -1.;
    yt.slice_mut(ndarray::s![1 + surface.nrows()..]).fill(1.);

    println!("Train implicit sphere on {} samples", xt.nrows());
    let gp = GaussianProcess::<f64, ThinPlateCov<f64>>::params(ThinPlateCov::new(0.5).unwrap())
        .noise(1e-6)
        .fit(&Dataset::new(xt, yt))
        .expect("GP fitting");
    println!("{gp}");

    for r in [0., 0.03, 0.06, 0.1, 0.15, 0.2] {
        let x = array![r, 0., 0.];
        let fx = gp.f(&x).expect("GP evaluation");
        let var = gp.var(&x).expect("GP variance");
        println!("r = {r:.2}  f = {:+.4}  grad = {:.3}  var = {var:.2e}", fx[0], fx.slice(ndarray::s![1..]));
    }
}
