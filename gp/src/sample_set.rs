use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};

/// Dimension of the input space
pub const INPUT_DIM: usize = 3;
/// Number of observed channels per sample: value and gradient components
pub const N_CHANNELS: usize = INPUT_DIM + 1;

/// Append-only set of training samples: 3D inputs, scalar labels and
/// the gradient targets observed along with them.
///
/// Labels follow the caller convention (0 on the surface, negative inside,
/// positive outside).
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet<F: Float> {
    inputs: Array2<F>,
    labels: Array1<F>,
    gradients: Array2<F>,
}

impl<F: Float> Default for SampleSet<F> {
    fn default() -> Self {
        SampleSet {
            inputs: Array2::zeros((0, INPUT_DIM)),
            labels: Array1::zeros(0),
            gradients: Array2::zeros((0, INPUT_DIM)),
        }
    }
}

impl<F: Float> SampleSet<F> {
    /// Empty sample set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there is no sample
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Training inputs (n, 3)
    pub fn inputs(&self) -> ArrayView2<'_, F> {
        self.inputs.view()
    }

    /// Training labels (n,)
    pub fn labels(&self) -> ArrayView1<'_, F> {
        self.labels.view()
    }

    /// Gradient targets (n, 3)
    pub fn gradients(&self) -> ArrayView2<'_, F> {
        self.gradients.view()
    }

    /// i-th training input
    pub fn point(&self, i: usize) -> ArrayView1<'_, F> {
        self.inputs.row(i)
    }

    /// Append samples observed with a zero gradient target. Such pseudo observations
    /// are weighted by the gradient noise of the model.
    pub fn add(
        &mut self,
        inputs: &ArrayBase<impl Data<Elem = F>, Ix2>,
        labels: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<()> {
        let gradients = Array2::zeros((inputs.nrows(), INPUT_DIM));
        self.add_with_gradients(inputs, labels, &gradients)
    }

    /// Append samples with explicit gradient targets (e.g. estimated normals).
    /// Nothing is appended when validation fails.
    pub fn add_with_gradients(
        &mut self,
        inputs: &ArrayBase<impl Data<Elem = F>, Ix2>,
        labels: &ArrayBase<impl Data<Elem = F>, Ix1>,
        gradients: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<()> {
        if inputs.ncols() != INPUT_DIM {
            return Err(GpError::InvalidValueError(format!(
                "inputs should be {}D points, got {} columns",
                INPUT_DIM,
                inputs.ncols()
            )));
        }
        if inputs.nrows() != labels.len() {
            return Err(GpError::InvalidValueError(format!(
                "inputs/labels size mismatch: {} points for {} labels",
                inputs.nrows(),
                labels.len()
            )));
        }
        if gradients.dim() != inputs.dim() {
            return Err(GpError::InvalidValueError(format!(
                "gradients shape {:?} should match inputs shape {:?}",
                gradients.dim(),
                inputs.dim()
            )));
        }
        let finite = inputs
            .iter()
            .chain(labels.iter())
            .chain(gradients.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(GpError::InvalidValueError(
                "samples should only contain finite values".to_string(),
            ));
        }

        self.inputs.append(Axis(0), inputs.view())?;
        self.labels.append(Axis(0), labels.view())?;
        self.gradients.append(Axis(0), gradients.view())?;
        Ok(())
    }

    /// Targets of the augmented system, interleaved per sample as
    /// `[y_0, g_0x, g_0y, g_0z, y_1, ...]`, starting at sample `from`.
    pub fn targets_from(&self, from: usize) -> Array1<F> {
        let n = self.len().saturating_sub(from);
        let mut y = Array1::zeros(N_CHANNELS * n);
        for (k, i) in (from..self.len()).enumerate() {
            y[N_CHANNELS * k] = self.labels[i];
            for a in 0..INPUT_DIM {
                y[N_CHANNELS * k + 1 + a] = self.gradients[[i, a]];
            }
        }
        y
    }

    /// Targets of the augmented system for all samples
    pub fn targets(&self) -> Array1<F> {
        self.targets_from(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_add_samples() {
        let mut samples = SampleSet::<f64>::new();
        assert!(samples.is_empty());
        samples
            .add(&array![[0., 0., 0.], [1., 0., 0.]], &array![-1., 0.])
            .unwrap();
        samples
            .add_with_gradients(&array![[0., 2., 0.]], &array![1.], &array![[0., 1., 0.]])
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert_abs_diff_eq!(samples.point(2), array![0., 2., 0.]);
        assert_abs_diff_eq!(
            samples.targets(),
            array![-1., 0., 0., 0., 0., 0., 0., 0., 1., 0., 1., 0.]
        );
        assert_abs_diff_eq!(samples.targets_from(2), array![1., 0., 1., 0.]);
    }

    #[test]
    fn test_add_mismatch_leaves_set_untouched() {
        let mut samples = SampleSet::<f64>::new();
        samples.add(&array![[0., 0., 0.]], &array![0.]).unwrap();
        let before = samples.clone();
        assert!(matches!(
            samples.add(&array![[1., 0., 0.], [2., 0., 0.]], &array![0.]),
            Err(GpError::InvalidValueError(_))
        ));
        assert!(samples.add(&array![[1., 0.]], &array![0.]).is_err());
        assert!(samples
            .add(&array![[f64::NAN, 0., 0.]], &array![0.])
            .is_err());
        assert!(samples
            .add_with_gradients(&array![[1., 0., 0.]], &array![0.], &array![[1., 0.]])
            .is_err());
        assert_eq!(samples, before);
    }
}
