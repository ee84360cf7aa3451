use crate::errors::{AtlasError, Result};
use gpatlas_gp::{compute_tangent_basis, normalized};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Data, Ix1};
use ndarray_rand::rand::Rng;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A disc of the surface tangent plane centered on a surface point.
///
/// The normal and tangent frame are derived from the gradient and recomputed
/// together whenever the gradient changes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Chart {
    id: usize,
    center: Array1<f64>,
    gradient: Array1<f64>,
    normal: Array1<f64>,
    tangent_x: Array1<f64>,
    tangent_y: Array1<f64>,
    radius: f64,
    variance: f64,
    #[cfg_attr(feature = "serializable", serde(skip))]
    samples: Option<Array2<f64>>,
}

impl Chart {
    /// Chart of given `radius` at `center`. Fails when `gradient` cannot be
    /// normalized or `center` is not a finite 3D point.
    pub fn new(
        center: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        id: usize,
        gradient: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        radius: f64,
        variance: f64,
    ) -> Result<Self> {
        if center.len() != 3 || center.iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::InvalidValue(format!(
                "chart center should be a finite 3D point, got {center}"
            )));
        }
        check_radius(radius)?;
        let (normal, tangent_x, tangent_y) = frame(gradient)?;
        Ok(Chart {
            id,
            center: center.to_owned(),
            gradient: gradient.to_owned(),
            normal,
            tangent_x,
            tangent_y,
            radius,
            variance,
            samples: None,
        })
    }

    /// Insertion order in the owning atlas
    pub fn id(&self) -> usize {
        self.id
    }

    /// Surface point the chart is anchored to
    pub fn center(&self) -> &Array1<f64> {
        &self.center
    }

    /// Outward gradient, not normalized
    pub fn gradient(&self) -> &Array1<f64> {
        &self.gradient
    }

    /// Unit outward normal
    pub fn normal(&self) -> &Array1<f64> {
        &self.normal
    }

    /// First tangent vector
    pub fn tangent_x(&self) -> &Array1<f64> {
        &self.tangent_x
    }

    /// Second tangent vector, `(tx, ty, n)` is right handed
    pub fn tangent_y(&self) -> &Array1<f64> {
        &self.tangent_y
    }

    /// Disc radius
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Surface model variance at the center
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Replace the gradient and recompute the normal and tangent frame.
    /// The chart is left untouched on failure.
    pub fn set_gradient(
        &mut self,
        gradient: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<()> {
        let (normal, tangent_x, tangent_y) = frame(gradient)?;
        self.gradient = gradient.to_owned();
        self.normal = normal;
        self.tangent_x = tangent_x;
        self.tangent_y = tangent_y;
        self.samples = None;
        Ok(())
    }

    /// Replace the disc radius
    pub fn set_radius(&mut self, radius: f64) -> Result<()> {
        check_radius(radius)?;
        self.radius = radius;
        self.samples = None;
        Ok(())
    }

    /// Point of the tangent plane at local coordinates `(u, v)`
    pub fn to_ambient(&self, u: f64, v: f64) -> Array1<f64> {
        &self.center + &(&self.tangent_x * u) + &(&self.tangent_y * v)
    }

    /// Point of the disc rim at angle `theta` from the first tangent vector
    pub fn rim_point(&self, theta: f64) -> Array1<f64> {
        self.to_ambient(self.radius * theta.cos(), self.radius * theta.sin())
    }

    /// Whether `point` lies within the disc radius from the center
    pub fn contains(&self, point: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        let d = point - &self.center;
        d.dot(&d) <= self.radius * self.radius
    }

    /// Draw `n` points uniformly distributed on the disc, cached until the
    /// next call, [`Chart::reset_samples`] or a frame change.
    pub fn sample_disc<R: Rng>(&mut self, n: usize, rng: &mut R) -> ArrayView2<'_, f64> {
        let mut samples = Array2::zeros((n, 3));
        for mut row in samples.rows_mut() {
            let rho = self.radius * rng.gen::<f64>().sqrt();
            let theta = 2. * PI * rng.gen::<f64>();
            row.assign(&self.to_ambient(rho * theta.cos(), rho * theta.sin()));
        }
        self.samples.insert(samples).view()
    }

    /// Cached disc samples, if any
    pub fn samples(&self) -> Option<ArrayView2<'_, f64>> {
        self.samples.as_ref().map(|s| s.view())
    }

    /// Drop cached disc samples
    pub fn reset_samples(&mut self) {
        self.samples = None;
    }
}

fn frame(
    gradient: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>)> {
    let normal = normalized(gradient)?;
    let (tangent_x, tangent_y) = compute_tangent_basis(&normal)?;
    Ok((normal, tangent_x, tangent_y))
}

fn check_radius(radius: f64) -> Result<()> {
    if !(radius > 0. && radius.is_finite()) {
        return Err(AtlasError::InvalidValue(format!(
            "chart radius should be positive and finite, got {radius}"
        )));
    }
    Ok(())
}
