use crate::errors::Result;
use gpatlas_gp::{CovarianceModel, GaussianProcess};
use ndarray::{Array1, ArrayView1};

/// A scalar field whose zero level-set is the surface covered by an atlas.
///
/// Implementors are only read during projection, chart creation and grid
/// scans, hence the `Sync` bound allowing parallel evaluation.
pub trait ImplicitSurface: Sync {
    /// Value and gradient `[f, ∂f/∂x, ∂f/∂y, ∂f/∂z]` at `x`
    fn evaluate(&self, x: ArrayView1<f64>) -> Result<Array1<f64>>;

    /// Uncertainty on the value at `x`
    fn variance(&self, x: ArrayView1<f64>) -> Result<f64>;

    /// Value at `x`
    fn value(&self, x: ArrayView1<f64>) -> Result<f64> {
        Ok(self.evaluate(x)?[0])
    }
}

impl<C: CovarianceModel<f64>> ImplicitSurface for GaussianProcess<f64, C> {
    fn evaluate(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        Ok(self.f(&x)?)
    }

    fn variance(&self, x: ArrayView1<f64>) -> Result<f64> {
        Ok(self.var(&x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AtlasError;
    use approx::assert_abs_diff_eq;
    use gpatlas_gp::{GpError, GpParams, SquaredExponentialCov};
    use linfa::ParamGuard;
    use ndarray::array;

    #[test]
    fn test_gp_as_surface() {
        let params = GpParams::new(SquaredExponentialCov::new(0.5, 1.).unwrap())
            .noise(1e-8)
            .check()
            .unwrap();
        let mut gp = GaussianProcess::new(params);
        let xt = array![[0., 0., 0.], [0.2, 0., 0.], [0., 0.2, 0.], [0., 0., 0.2]];
        gp.add_patterns(&xt, &array![-1., 0., 0., 0.]).unwrap();

        let surface: &dyn ImplicitSurface = &gp;
        assert!(matches!(
            surface.value(xt.row(1)),
            Err(AtlasError::GpError(GpError::UninitializedError(_)))
        ));

        gp.compute().unwrap();
        let surface: &dyn ImplicitSurface = &gp;
        assert_abs_diff_eq!(surface.value(xt.row(0)).unwrap(), -1., epsilon = 1e-4);
        assert_abs_diff_eq!(surface.value(xt.row(2)).unwrap(), 0., epsilon = 1e-4);
        assert_eq!(surface.evaluate(xt.row(3)).unwrap().len(), 4);
        assert_abs_diff_eq!(surface.variance(xt.row(1)).unwrap(), 0., epsilon = 1e-4);
    }
}
