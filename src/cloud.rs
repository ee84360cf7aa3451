//! Object point clouds: synthetic spheres, `.npy` files and their bounding geometry.
use crate::errors::{GpatlasError, Result};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_npy::{read_npy, write_npy};
use std::f64::consts::PI;
use std::path::Path;

fn check_cloud(cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<()> {
    if cloud.nrows() == 0 {
        return Err(GpatlasError::InvalidCloudError("cloud is empty".to_string()));
    }
    if cloud.ncols() != 3 {
        return Err(GpatlasError::InvalidCloudError(format!(
            "cloud should hold 3D points, got {} columns",
            cloud.ncols()
        )));
    }
    if cloud.iter().any(|v| !v.is_finite()) {
        return Err(GpatlasError::InvalidCloudError(
            "cloud should only contain finite coordinates".to_string(),
        ));
    }
    Ok(())
}

/// Mean point of the cloud
pub fn centroid(cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array1<f64>> {
    check_cloud(cloud)?;
    cloud
        .mean_axis(Axis(0))
        .ok_or_else(|| GpatlasError::InvalidCloudError("cloud is empty".to_string()))
}

/// Axis aligned bounding box as `(lower, upper)` corners
pub fn bounding_box(
    cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    check_cloud(cloud)?;
    let lower = cloud.fold_axis(Axis(0), f64::INFINITY, |m, v| m.min(*v));
    let upper = cloud.fold_axis(Axis(0), f64::NEG_INFINITY, |m, v| m.max(*v));
    Ok((lower, upper))
}

/// Length of the bounding box diagonal
pub fn bounding_box_diagonal(cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<f64> {
    let (lower, upper) = bounding_box(cloud)?;
    let d = upper - lower;
    Ok(d.dot(&d).sqrt())
}

/// Points of a sphere laid out in `lin_div` latitude rings of `ang_div` points.
///
/// Rings are evenly spaced along z, the first one half a step above the south
/// pole. With `half` only the rings below `center.z + radius / 2` are kept.
pub fn sphere_cloud(
    radius: f64,
    center: [f64; 3],
    ang_div: usize,
    lin_div: usize,
    half: bool,
) -> Array2<f64> {
    let lin_step = 2. * radius / lin_div as f64;
    let end = if half { radius / 2. } else { radius };
    let rings: Vec<f64> = (0..lin_div)
        .map(|i| -radius + lin_step / 2. + i as f64 * lin_step)
        .filter(|&lin| lin < end)
        .collect();

    let mut cloud = Array2::zeros((rings.len() * ang_div, 3));
    for (i, lin) in rings.iter().enumerate() {
        let rho = (radius * radius - lin * lin).sqrt();
        for k in 0..ang_div {
            let ang = 2. * PI * k as f64 / ang_div as f64;
            let mut p = cloud.row_mut(i * ang_div + k);
            p[0] = rho * ang.cos() + center[0];
            p[1] = rho * ang.sin() + center[1];
            p[2] = lin + center[2];
        }
    }
    cloud
}

/// Read an (n, 3) cloud from a `.npy` file
pub fn load_cloud<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let cloud: Array2<f64> = read_npy(path)?;
    check_cloud(&cloud)?;
    Ok(cloud)
}

/// Write an (n, 3) cloud to a `.npy` file
pub fn save_cloud<P: AsRef<Path>>(
    path: P,
    cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Result<()> {
    write_npy(path, &cloud.to_owned())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sphere_cloud() {
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 24, 20, false);
        assert_eq!(cloud.dim(), (480, 3));
        for p in cloud.rows() {
            let r = (p[0] * p[0] + p[1] * p[1] + (p[2] - 1.) * (p[2] - 1.)).sqrt();
            assert_abs_diff_eq!(r, 0.06, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(centroid(&cloud).unwrap(), array![0., 0., 1.], epsilon = 1e-12);
    }

    #[test]
    fn test_half_sphere_cloud() {
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 24, 20, true);
        // rings at -0.057, -0.051, ..., 0.027
        assert_eq!(cloud.nrows(), 15 * 24);
        assert!(cloud.column(2).iter().all(|&z| z < 1.03));
    }

    #[test]
    fn test_bounding_box() {
        let cloud = array![[0., 1., 2.], [1., -1., 0.], [0.5, 0., 4.]];
        let (lower, upper) = bounding_box(&cloud).unwrap();
        assert_abs_diff_eq!(lower, array![0., -1., 0.]);
        assert_abs_diff_eq!(upper, array![1., 1., 4.]);
        assert_abs_diff_eq!(bounding_box_diagonal(&cloud).unwrap(), 21f64.sqrt());
    }

    #[test]
    fn test_invalid_cloud() {
        assert!(matches!(
            centroid(&Array2::<f64>::zeros((0, 3))),
            Err(GpatlasError::InvalidCloudError(_))
        ));
        assert!(bounding_box(&Array2::<f64>::zeros((2, 2))).is_err());
        assert!(centroid(&array![[f64::NAN, 0., 0.]]).is_err());
    }

    #[test]
    fn test_cloud_npy_roundtrip() {
        std::fs::create_dir_all("target/tests").ok();
        let cloud = sphere_cloud(0.1, [1., 2., 3.], 6, 4, false);
        save_cloud("target/tests/cloud.npy", &cloud).unwrap();
        let loaded = load_cloud("target/tests/cloud.npy").unwrap();
        assert_abs_diff_eq!(loaded, cloud);
    }
}
