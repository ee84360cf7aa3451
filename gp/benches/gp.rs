use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gpatlas_gp::{GaussianProcess, GpValidParams, ThinPlateCov};
use linfa::ParamGuard;
use ndarray::{s, Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn training_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = Array::random_using((n, 3), Uniform::new(-0.1f64, 0.1), &mut rng);
    let yt = xt.map_axis(Axis(1), |x| x.dot(&x).sqrt() - 0.05);
    (xt, yt)
}

fn params() -> GpValidParams<f64, ThinPlateCov<f64>> {
    GaussianProcess::<f64, ThinPlateCov<f64>>::params(ThinPlateCov::new(0.5).unwrap())
        .noise(1e-6)
        .check()
        .expect("valid GP parameters")
}

fn criterion_gp(c: &mut Criterion) {
    let nts = [50, 100, 200];

    let mut group = c.benchmark_group("gp");
    group.sample_size(10);
    for nt in nts {
        let (xt, yt) = training_data(nt);

        group.bench_function(format!("gp batch {nt}"), |b| {
            b.iter(|| {
                let mut gp = GaussianProcess::new(params());
                gp.add_patterns(&xt, &yt).expect("GP add error");
                gp.compute().expect("GP compute error");
                black_box(gp)
            });
        });

        // half of the samples already factorized, the other half added by blocks of 10
        let half = nt / 2;
        let mut base = GaussianProcess::new(params());
        base.add_patterns(&xt.slice(s![..half, ..]), &yt.slice(s![..half]))
            .expect("GP add error");
        group.bench_function(format!("gp incremental {nt}"), |b| {
            b.iter(|| {
                let mut gp = base.clone();
                for start in (half..nt).step_by(10) {
                    let end = (start + 10).min(nt);
                    gp.add_patterns(&xt.slice(s![start..end, ..]), &yt.slice(s![start..end]))
                        .expect("GP add error");
                }
                gp.compute().expect("GP compute error");
                black_box(gp)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_gp);
criterion_main!(benches);
