use crate::errors::Result;
use crate::surface::ImplicitSurface;
use ndarray::{array, Array1, ArrayView1};

/// Signed distance to a sphere, with a variance growing along +x
pub(crate) struct SphereSurface {
    pub center: Array1<f64>,
    pub radius: f64,
}

impl SphereSurface {
    pub fn new(center: [f64; 3], radius: f64) -> Self {
        SphereSurface {
            center: Array1::from_vec(center.to_vec()),
            radius,
        }
    }
}

impl ImplicitSurface for SphereSurface {
    fn evaluate(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        let r = &x - &self.center;
        let d = r.dot(&r).sqrt();
        if d == 0. {
            return Ok(array![-self.radius, 0., 0., 0.]);
        }
        Ok(array![d - self.radius, r[0] / d, r[1] / d, r[2] / d])
    }

    fn variance(&self, x: ArrayView1<f64>) -> Result<f64> {
        Ok(1. + x[0] - self.center[0])
    }
}
