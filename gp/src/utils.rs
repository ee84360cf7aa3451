use crate::errors::{GpError, Result};
use linfa::Float;
use linfa_linalg::svd::*;
use ndarray::{s, Array1, Array2, ArrayBase, ArrayView2, ArrayViewMut2, Axis, Data, Ix1, Ix2};
use ndarray_stats::QuantileExt;

/// A square matrix whose allocated storage grows geometrically while only
/// its leading `used x used` block is meaningful.
#[derive(Clone, Debug, PartialEq)]
pub struct GrowableMatrix<F: Float> {
    data: Array2<F>,
    used: usize,
    initial_capacity: usize,
}

impl<F: Float> GrowableMatrix<F> {
    /// Empty matrix allocating at least `initial_capacity` rows on first growth
    pub fn new(initial_capacity: usize) -> Self {
        GrowableMatrix {
            data: Array2::zeros((0, 0)),
            used: 0,
            initial_capacity,
        }
    }

    /// Logical size
    pub fn used(&self) -> usize {
        self.used
    }

    /// Allocated size
    pub fn capacity(&self) -> usize {
        self.data.nrows()
    }

    /// Leading `used x used` block
    pub fn view(&self) -> ArrayView2<'_, F> {
        self.data.slice(s![..self.used, ..self.used])
    }

    /// Mutable leading `used x used` block
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, F> {
        self.data.slice_mut(s![..self.used, ..self.used])
    }

    /// Set the logical size. The current block is kept, rows and columns
    /// entering the logical block are zeroed.
    pub fn resize(&mut self, size: usize) {
        if size > self.capacity() {
            let capacity = size.max(2 * self.capacity()).max(self.initial_capacity);
            let mut data = Array2::zeros((capacity, capacity));
            data.slice_mut(s![..self.used, ..self.used])
                .assign(&self.data.slice(s![..self.used, ..self.used]));
            self.data = data;
        } else if size > self.used {
            let used = self.used;
            self.data.slice_mut(s![used..size, ..size]).fill(F::zero());
            self.data.slice_mut(s![..used, used..size]).fill(F::zero());
        }
        self.used = size;
    }

    /// Replace the logical block by the given square matrix
    pub fn assign(&mut self, mat: &ArrayBase<impl Data<Elem = F>, Ix2>) {
        self.used = 0;
        self.resize(mat.nrows());
        self.view_mut().assign(mat);
    }

    /// Reset the logical size to zero, keeping the allocation
    pub fn clear(&mut self) {
        self.used = 0;
    }
}

/// Cross product of 3D vectors
pub fn cross<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix1>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array1<F> {
    Array1::from_vec(vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

/// Unit vector along `v`, fails when `v` is zero or not finite
pub fn normalized<F: Float>(v: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Array1<F>> {
    let norm = v.dot(v).sqrt();
    if !norm.is_finite() || norm <= F::epsilon() {
        return Err(GpError::InvalidValueError(format!(
            "cannot normalize vector {v} of norm {norm}"
        )));
    }
    Ok(v.mapv(|x| x / norm))
}

/// Tangent basis `(Tx, Ty)` of the plane orthogonal to `normal`.
///
/// The left singular vectors of the projector `I - N Nᵀ` associated with its two
/// largest singular values span the plane whatever the direction of `N`,
/// including coordinate axes. `Ty` is oriented so that `(Tx, Ty, N)` is right handed.
pub fn compute_tangent_basis<F: Float>(
    normal: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<(Array1<F>, Array1<F>)> {
    if normal.len() != 3 {
        return Err(GpError::InvalidValueError(format!(
            "normal should be a 3D vector, got {} components",
            normal.len()
        )));
    }
    let n = normalized(normal)?;
    let nn = n.view().insert_axis(Axis(1));
    let projector = Array2::<F>::eye(3) - nn.dot(&nn.t());

    let (u, sigma, _) = projector.svd(true, false)?;
    let u = u.ok_or_else(|| {
        GpError::NumericalError("left singular vectors not computed".to_string())
    })?;
    let smallest = sigma
        .argmin()
        .map_err(|_| GpError::NumericalError(format!("invalid singular values {sigma}")))?;
    let kept: Vec<usize> = (0..3).filter(|&i| i != smallest).collect();
    let (i, j) = if sigma[kept[1]] > sigma[kept[0]] {
        (kept[1], kept[0])
    } else {
        (kept[0], kept[1])
    };

    let tx = u.column(i).to_owned();
    let mut ty = u.column(j).to_owned();
    if cross(&tx, &ty).dot(&n) < F::zero() {
        ty.mapv_inplace(|v| -v);
    }
    Ok((tx, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use paste::paste;
    use rand_xoshiro::Xoshiro256Plus;

    fn check_basis(normal: &Array1<f64>) {
        let (tx, ty) = compute_tangent_basis(normal).unwrap();
        let n = normalized(normal).unwrap();
        assert_abs_diff_eq!(tx.dot(&tx), 1., epsilon = 1e-10);
        assert_abs_diff_eq!(ty.dot(&ty), 1., epsilon = 1e-10);
        assert_abs_diff_eq!(tx.dot(&ty), 0., epsilon = 1e-10);
        assert_abs_diff_eq!(tx.dot(&n), 0., epsilon = 1e-10);
        assert_abs_diff_eq!(ty.dot(&n), 0., epsilon = 1e-10);
        assert_abs_diff_eq!(cross(&tx, &ty), n, epsilon = 1e-10);
    }

    macro_rules! test_tangent_basis {
        ($name:ident, $normal:expr) => {
            paste! {
                #[test]
                fn [<test_tangent_basis_ $name>]() {
                    check_basis(&$normal);
                }
            }
        };
    }

    test_tangent_basis!(x_axis, array![1., 0., 0.]);
    test_tangent_basis!(y_axis, array![0., 1., 0.]);
    test_tangent_basis!(z_axis, array![0., 0., 1.]);
    test_tangent_basis!(minus_z_axis, array![0., 0., -1.]);
    test_tangent_basis!(unnormalized, array![3., -4., 12.]);

    #[test]
    fn test_tangent_basis_random_normals() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let normals = Array::random_using((50, 3), Uniform::new(-1., 1.), &mut rng);
        for n in normals.rows() {
            check_basis(&n.to_owned());
        }
    }

    #[test]
    fn test_tangent_basis_degenerate_normal() {
        assert!(compute_tangent_basis(&array![0., 0., 0.]).is_err());
        assert!(compute_tangent_basis(&array![f64::NAN, 0., 1.]).is_err());
        assert!(compute_tangent_basis(&array![1., 0.]).is_err());
    }

    #[test]
    fn test_growable_matrix() {
        let mut m = GrowableMatrix::<f64>::new(3);
        assert_eq!(m.capacity(), 0);
        m.assign(&array![[1., 0.], [2., 3.]]);
        assert_eq!(m.capacity(), 3);
        m.resize(3);
        assert_eq!(m.capacity(), 3);
        assert_abs_diff_eq!(m.view(), array![[1., 0., 0.], [2., 3., 0.], [0., 0., 0.]]);
        m.view_mut()[[2, 2]] = 4.;
        m.resize(5);
        assert_eq!(m.capacity(), 6);
        let view = m.view();
        assert_abs_diff_eq!(
            view.slice(s![..3, ..3]),
            array![[1., 0., 0.], [2., 3., 0.], [0., 0., 4.]]
        );
        assert_abs_diff_eq!(view.slice(s![3.., ..]).sum(), 0.);

        // shrinking then growing back zeroes the stale entries
        m.resize(1);
        m.resize(3);
        assert_abs_diff_eq!(m.view(), array![[1., 0., 0.], [0., 0., 0.], [0., 0., 0.]]);
        m.clear();
        assert_eq!(m.used(), 0);
        assert_eq!(m.capacity(), 6);
    }
}
