use crate::errors::{AtlasError, Result};
use crate::surface::ImplicitSurface;
use log::info;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Settings of the grid scan of the zero level-set
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize), serde(default))]
pub struct SamplerParams {
    /// Scaling of the object bounding box defining the scanned region
    pub scale: f64,
    /// Grid spacing
    pub step: f64,
    /// Grid points with `|f| <= tolerance` are kept
    pub tolerance: f64,
}

impl Default for SamplerParams {
    fn default() -> Self {
        SamplerParams {
            scale: 1.2,
            step: 0.005,
            tolerance: 1e-3,
        }
    }
}

/// Brute force search of points near the zero level-set on a regular grid
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSampler {
    bounds: Array2<f64>,
    params: SamplerParams,
}

impl SurfaceSampler {
    /// Sampler scanning `bounds`, one `[lower, upper]` row per axis
    pub fn new(
        bounds: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: SamplerParams,
    ) -> Result<Self> {
        if bounds.dim() != (3, 2) {
            return Err(AtlasError::InvalidValue(format!(
                "bounds should be a (3, 2) array, got {:?}",
                bounds.dim()
            )));
        }
        if bounds
            .rows()
            .into_iter()
            .any(|b| !(b[0].is_finite() && b[1].is_finite() && b[0] <= b[1]))
        {
            return Err(AtlasError::InvalidValue(format!(
                "bounds should be finite with lower <= upper, got {bounds}"
            )));
        }
        if !(params.step > 0. && params.tolerance >= 0. && params.scale > 0.) {
            return Err(AtlasError::InvalidValue(format!(
                "invalid sampler parameters {params:?}"
            )));
        }
        Ok(SurfaceSampler {
            bounds: bounds.to_owned(),
            params,
        })
    }

    /// Sampler scanning the bounding box of `cloud` (n, 3) enlarged by `scale`
    /// around its center, and by `1.5 scale` along z.
    pub fn from_cloud(
        cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: SamplerParams,
    ) -> Result<Self> {
        if cloud.nrows() == 0 || cloud.ncols() != 3 {
            return Err(AtlasError::InvalidValue(format!(
                "cloud should be a non empty (n, 3) array, got {:?}",
                cloud.dim()
            )));
        }
        let lower = cloud.fold_axis(Axis(0), f64::INFINITY, |m, v| m.min(*v));
        let upper = cloud.fold_axis(Axis(0), f64::NEG_INFINITY, |m, v| m.max(*v));
        let center = (&lower + &upper) / 2.;
        let mut half = (&upper - &lower) * (params.scale / 2.);
        half[2] *= 1.5;
        let mut bounds = Array2::zeros((3, 2));
        bounds.column_mut(0).assign(&(&center - &half));
        bounds.column_mut(1).assign(&(&center + &half));
        Self::new(&bounds, params)
    }

    /// Scanned region, one `[lower, upper]` row per axis
    pub fn bounds(&self) -> &Array2<f64> {
        &self.bounds
    }

    /// Settings
    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    /// Number of grid points along each axis
    pub fn grid_shape(&self) -> [usize; 3] {
        let mut shape = [0; 3];
        for (a, n) in shape.iter_mut().enumerate() {
            let extent = self.bounds[[a, 1]] - self.bounds[[a, 0]];
            *n = (extent / self.params.step + 1e-9).floor() as usize + 1;
        }
        shape
    }

    fn grid_point(&self, index: usize) -> Array1<f64> {
        let [_, ny, nz] = self.grid_shape();
        let ijk = [index / (ny * nz), (index / nz) % ny, index % nz];
        Array1::from_shape_fn(3, |a| self.bounds[[a, 0]] + ijk[a] as f64 * self.params.step)
    }

    /// Grid points where `|f| <= tolerance`, (m, 3). Grid points are evaluated in parallel.
    pub fn sample(&self, surface: &dyn ImplicitSurface) -> Result<Array2<f64>> {
        let now = Instant::now();
        let [nx, ny, nz] = self.grid_shape();
        let kept = (0..nx * ny * nz)
            .into_par_iter()
            .map(|i| -> Result<Option<Array1<f64>>> {
                let x = self.grid_point(i);
                let f = surface.value(x.view())?;
                Ok((f.abs() <= self.params.tolerance).then_some(x))
            })
            .collect::<Result<Vec<_>>>()?;

        let kept: Vec<Array1<f64>> = kept.into_iter().flatten().collect();
        let mut points = Array2::zeros((kept.len(), 3));
        for (mut row, x) in points.rows_mut().into_iter().zip(kept.iter()) {
            row.assign(x);
        }
        info!(
            "surface sampling: {} / {} grid points kept ({}ms)",
            points.nrows(),
            nx * ny * nz,
            now.elapsed().as_millis()
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SphereSurface;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_from_cloud_bounds() {
        let cloud = array![[0., 0., 0.], [1., 2., 2.], [0.5, 1., 1.]];
        let sampler = SurfaceSampler::from_cloud(&cloud, SamplerParams::default()).unwrap();
        assert_abs_diff_eq!(
            sampler.bounds(),
            &array![[-0.1, 1.1], [-0.2, 2.2], [-0.8, 2.8]],
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_grid_shape() {
        let bounds = array![[0., 1.], [0., 0.5], [0., 0.]];
        let params = SamplerParams {
            step: 0.1,
            ..Default::default()
        };
        let sampler = SurfaceSampler::new(&bounds, params).unwrap();
        assert_eq!(sampler.grid_shape(), [11, 6, 1]);
        assert_abs_diff_eq!(sampler.grid_point(0), array![0., 0., 0.]);
        assert_abs_diff_eq!(sampler.grid_point(6 + 2), array![0.1, 0.2, 0.], epsilon = 1e-12);
    }

    #[test]
    fn test_sample_sphere() {
        let sphere = SphereSurface::new([0., 0., 0.], 0.5);
        let bounds = array![[-0.6, 0.6], [-0.6, 0.6], [-0.6, 0.6]];
        let params = SamplerParams {
            step: 0.05,
            tolerance: 0.02,
            ..Default::default()
        };
        let sampler = SurfaceSampler::new(&bounds, params).unwrap();
        let points = sampler.sample(&sphere).unwrap();
        assert!(points.nrows() > 50);
        for p in points.rows() {
            assert!((p.dot(&p).sqrt() - 0.5).abs() <= 0.02);
        }
        // axis points of the grid lie exactly on the sphere
        assert!(points
            .rows()
            .into_iter()
            .any(|p| (&p - &array![0.5, 0., 0.]).iter().all(|v| v.abs() < 1e-9)));
    }

    #[test]
    fn test_invalid_sampler() {
        let params = SamplerParams::default();
        assert!(SurfaceSampler::new(&array![[0., 1.], [0., 1.]], params).is_err());
        assert!(SurfaceSampler::new(&array![[0., 1.], [1., 0.], [0., 1.]], params).is_err());
        assert!(SurfaceSampler::from_cloud(&Array2::<f64>::zeros((0, 3)), params).is_err());
        let params = SamplerParams {
            step: 0.,
            ..Default::default()
        };
        assert!(SurfaceSampler::new(&array![[0., 1.], [0., 1.], [0., 1.]], params).is_err());
    }
}
