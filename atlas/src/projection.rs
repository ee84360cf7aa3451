use crate::errors::{AtlasError, Result};
use crate::surface::ImplicitSurface;
use log::{debug, warn};
use ndarray::{Array1, ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Settings of the projection onto the zero level-set
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize), serde(default))]
pub struct ProjectionParams {
    /// Stop when `|f|` falls under this value
    pub f_tol: f64,
    /// Stop when `|f|` changes by less than this value in one step
    pub improve_tol: f64,
    /// Maximum number of steps
    pub max_iters: usize,
    /// Step length multiplier
    pub step_mul: f64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        ProjectionParams {
            f_tol: 1e-2,
            improve_tol: 1e-6,
            max_iters: 5000,
            step_mul: 1.,
        }
    }
}

impl ProjectionParams {
    /// Check parameters consistency
    pub fn check(&self) -> Result<()> {
        if !(self.f_tol >= 0. && self.improve_tol >= 0.) {
            return Err(AtlasError::InvalidValue(format!(
                "projection tolerances should be positive, got f_tol={} improve_tol={}",
                self.f_tol, self.improve_tol
            )));
        }
        if !(self.step_mul > 0. && self.step_mul.is_finite()) {
            return Err(AtlasError::InvalidValue(format!(
                "projection step multiplier should be positive, got {}",
                self.step_mul
            )));
        }
        Ok(())
    }
}

/// Criterion which ended a projection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Convergence {
    /// `|f| < f_tol`
    FunctionTolerance,
    /// The last step improved `f` by less than `improve_tol`
    ImprovementStall,
    /// Step budget exhausted, the last iterate is returned
    MaxIterations,
    /// The walk left the finite domain of the surface, the iterate with the
    /// smallest `|f|` is returned
    Diverged,
}

/// Outcome of a projection
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    /// Last iterate
    pub point: Array1<f64>,
    /// Surface value at `point`
    pub residual: f64,
    /// Number of steps taken
    pub iterations: usize,
    /// Termination criterion
    pub convergence: Convergence,
}

impl Projection {
    /// Whether the residual is within the function tolerance
    pub fn is_on_surface(&self) -> bool {
        self.convergence == Convergence::FunctionTolerance
    }
}

/// Walk `input` toward the zero level-set of `surface` with steps
/// `x <- x - step_mul f(x) direction`.
///
/// `direction` is kept fixed during the walk: scaling it as `g / |g|²`, with `g`
/// the gradient near `input`, gives Newton steps along the normal. Reaching
/// the iteration cap or running away from the surface is not an error.
///
/// Only the evaluation at `input` may fail: once walking, a non-finite iterate
/// or a surface refusing to evaluate it ends the walk as [`Convergence::Diverged`].
pub fn project(
    surface: &dyn ImplicitSurface,
    input: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    direction: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    params: &ProjectionParams,
) -> Result<Projection> {
    params.check()?;
    if input.len() != 3 || direction.len() != 3 {
        return Err(AtlasError::InvalidValue(format!(
            "projection expects 3D point and direction, got {} and {}",
            input.len(),
            direction.len()
        )));
    }
    if direction.iter().any(|v| !v.is_finite()) {
        return Err(AtlasError::InvalidValue(format!(
            "projection direction should be finite, got {direction}"
        )));
    }

    let mut point = input.to_owned();
    let mut f = surface.value(point.view())?;
    let mut best = (point.clone(), f);
    let mut iterations = 0;
    let convergence = loop {
        if f.abs() < params.f_tol {
            break Convergence::FunctionTolerance;
        }
        if iterations >= params.max_iters {
            break Convergence::MaxIterations;
        }
        point.scaled_add(-params.step_mul * f, direction);
        iterations += 1;
        let f_new = match step_value(surface, &point) {
            Some(v) => v,
            None => {
                (point, f) = best;
                break Convergence::Diverged;
            }
        };
        let improvement = (f_new - f).abs();
        f = f_new;
        if f.abs() < best.1.abs() {
            best = (point.clone(), f);
        }
        if improvement < params.improve_tol && f.abs() >= params.f_tol {
            break Convergence::ImprovementStall;
        }
    };

    match convergence {
        Convergence::MaxIterations => warn!(
            "projection not converged after {} iterations (|f|={})",
            iterations,
            f.abs()
        ),
        Convergence::Diverged => warn!(
            "projection diverged after {} iterations, keeping best iterate {} (|f|={})",
            iterations,
            point,
            f.abs()
        ),
        _ => debug!(
            "projection {:?} after {} iterations (|f|={})",
            convergence,
            iterations,
            f.abs()
        ),
    }
    Ok(Projection {
        point,
        residual: f,
        iterations,
        convergence,
    })
}

/// Surface value at an iterate, `None` once the walk left the finite domain
fn step_value(surface: &dyn ImplicitSurface, point: &Array1<f64>) -> Option<f64> {
    if point.iter().any(|v| !v.is_finite()) {
        return None;
    }
    surface.value(point.view()).ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SphereSurface;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use paste::paste;

    /// Constant field, every step stalls
    struct Plateau;

    impl ImplicitSurface for Plateau {
        fn evaluate(&self, _x: ndarray::ArrayView1<f64>) -> Result<Array1<f64>> {
            Ok(array![0.5, 0., 0., 0.])
        }

        fn variance(&self, _x: ndarray::ArrayView1<f64>) -> Result<f64> {
            Ok(0.)
        }
    }

    /// `f = exp(x)`, refusing non-finite queries like a GP does
    struct Runaway;

    impl ImplicitSurface for Runaway {
        fn evaluate(&self, x: ndarray::ArrayView1<f64>) -> Result<Array1<f64>> {
            if x.iter().any(|v| !v.is_finite()) {
                return Err(AtlasError::InvalidValue(format!("non finite query {x}")));
            }
            let f = x[0].exp();
            Ok(array![f, f, 0., 0.])
        }

        fn variance(&self, _x: ndarray::ArrayView1<f64>) -> Result<f64> {
            Ok(0.)
        }
    }

    #[test]
    fn test_project_diverging_walk() {
        let x = array![0., 0.5, 0.];
        let res = project(&Runaway, &x, &array![-1., 0., 0.], &ProjectionParams::default()).unwrap();
        assert_eq!(res.convergence, Convergence::Diverged);
        assert!(res.iterations > 1);
        assert!(!res.is_on_surface());
        // every step moved away, the start is the best iterate
        assert_eq!(res.point, x);
        assert_abs_diff_eq!(res.residual, 1.);
    }

    #[test]
    fn test_project_fixed_point() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let x = array![0., 1.001, 0.];
        let res = project(&sphere, &x, &array![0., 1., 0.], &ProjectionParams::default()).unwrap();
        assert_eq!(res.iterations, 0);
        assert_eq!(res.convergence, Convergence::FunctionTolerance);
        assert_eq!(res.point, x);
        assert!(res.is_on_surface());
    }

    #[test]
    fn test_project_newton_step() {
        let sphere = SphereSurface::new([1., 0., 0.], 0.5);
        let res = project(
            &sphere,
            &array![1., 0., 2.],
            &array![0., 0., 1.],
            &ProjectionParams::default(),
        )
        .unwrap();
        assert_eq!(res.convergence, Convergence::FunctionTolerance);
        assert_eq!(res.iterations, 1);
        assert_abs_diff_eq!(res.point, array![1., 0., 0.5], epsilon = 1e-12);
        assert_abs_diff_eq!(res.residual, 0., epsilon = 1e-12);
    }

    macro_rules! test_project_radial {
        ($name:ident, $dir:expr) => {
            paste! {
                #[test]
                fn [<test_project_radial_ $name>]() {
                    let dir: Array1<f64> = $dir;
                    let dir = &dir / dir.dot(&dir).sqrt();
                    let sphere = SphereSurface::new([0., 0., 0.], 1.);
                    let res = project(&sphere, &(&dir * 2.), &dir, &ProjectionParams::default()).unwrap();
                    assert_eq!(res.convergence, Convergence::FunctionTolerance);
                    assert_eq!(res.iterations, 1);
                    assert_abs_diff_eq!(res.point, dir, epsilon = 1e-12);
                }
            }
        };
    }

    test_project_radial!(x_axis, array![1., 0., 0.]);
    test_project_radial!(minus_y_axis, array![0., -1., 0.]);
    test_project_radial!(diagonal, array![1., 1., 1.]);
    test_project_radial!(skewed, array![-2., 0.5, 3.]);

    #[test]
    fn test_project_damped_steps() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let params = ProjectionParams {
            f_tol: 1e-6,
            improve_tol: 1e-12,
            step_mul: 0.5,
            ..Default::default()
        };
        let res = project(&sphere, &array![0.2, 0., 0.], &array![1., 0., 0.], &params).unwrap();
        assert_eq!(res.convergence, Convergence::FunctionTolerance);
        assert!(res.iterations > 1);
        assert_abs_diff_eq!(res.point, array![1., 0., 0.], epsilon = 1e-5);
    }

    #[test]
    fn test_project_stall() {
        let res = project(
            &Plateau,
            &array![0., 0., 0.],
            &array![1., 0., 0.],
            &ProjectionParams::default(),
        )
        .unwrap();
        assert_eq!(res.convergence, Convergence::ImprovementStall);
        assert_eq!(res.iterations, 1);
        assert_abs_diff_eq!(res.residual, 0.5);
    }

    #[test]
    fn test_project_max_iterations() {
        // steps overshoot back and forth around the surface
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let params = ProjectionParams {
            max_iters: 7,
            step_mul: 2.,
            ..Default::default()
        };
        let res = project(&sphere, &array![0., 0., 1.5], &array![0., 0., 1.], &params).unwrap();
        assert_eq!(res.convergence, Convergence::MaxIterations);
        assert_eq!(res.iterations, 7);
        assert_abs_diff_eq!(res.residual.abs(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_project_invalid() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let x = array![0., 0., 2.];
        let params = ProjectionParams {
            step_mul: 0.,
            ..Default::default()
        };
        assert!(project(&sphere, &x, &array![0., 0., 1.], &params).is_err());
        assert!(project(&sphere, &x, &array![0., 1.], &ProjectionParams::default()).is_err());
        assert!(project(&sphere, &x, &array![f64::NAN, 0., 1.], &ProjectionParams::default()).is_err());
    }
}
