use crate::cloud::{bounding_box_diagonal, centroid, sphere_cloud};
use crate::config::TrainingConfig;
use crate::errors::Result;
use ndarray::{concatenate, s, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix2};

/// Labelled points an implicit surface is trained on: the object centroid
/// (inside), the object cloud (surface) and a sphere of points around the
/// centroid (outside).
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSet {
    inputs: Array2<f64>,
    labels: Array1<f64>,
    n_object: usize,
}

impl TrainingSet {
    /// Training set of an object cloud (n, 3)
    pub fn from_cloud(
        cloud: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        config: &TrainingConfig,
    ) -> Result<Self> {
        let center = centroid(cloud)?;
        let shell = sphere_cloud(
            config.outer_radius,
            [center[0], center[1], center[2]],
            config.ang_div,
            config.lin_div,
            false,
        );
        let inputs = concatenate![
            Axis(0),
            center.view().insert_axis(Axis(0)),
            cloud.view(),
            shell.view()
        ];
        let mut labels = Array1::from_elem(inputs.nrows(), config.surface_label);
        labels[0] = config.inside_label;
        labels
            .slice_mut(s![1 + cloud.nrows()..])
            .fill(config.outside_label);
        Ok(TrainingSet {
            inputs,
            labels,
            n_object: cloud.nrows(),
        })
    }

    /// All training points (n, 3)
    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    /// Labels (n,)
    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// Number of training points
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there is no training point, never true once built from a cloud
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Object centroid, labelled inside
    pub fn centroid(&self) -> Array1<f64> {
        self.inputs.row(0).to_owned()
    }

    /// Object points, labelled on the surface
    pub fn object(&self) -> ArrayView2<'_, f64> {
        self.inputs.slice(s![1..1 + self.n_object, ..])
    }

    /// Points around the object, labelled outside
    pub fn shell(&self) -> ArrayView2<'_, f64> {
        self.inputs.slice(s![1 + self.n_object.., ..])
    }

    /// Bounding box diagonal of all training points, an upper bound of the
    /// distance between any two of them
    pub fn diagonal(&self) -> Result<f64> {
        bounding_box_diagonal(&self.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_training_set_from_sphere() {
        let cloud = sphere_cloud(0.06, [0., 0., 1.], 8, 6, false);
        let training = TrainingSet::from_cloud(&cloud, &TrainingConfig::default()).unwrap();
        assert_eq!(training.len(), 97);
        assert_abs_diff_eq!(training.centroid(), array![0., 0., 1.], epsilon = 1e-12);
        assert_abs_diff_eq!(training.labels()[0], -1.);
        assert_eq!(training.object(), cloud);
        assert!(training.labels().slice(s![1..49]).iter().all(|&l| l == 0.));
        assert!(training.labels().slice(s![49..]).iter().all(|&l| l == 1.));
        for p in training.shell().rows() {
            let d = &p - &training.centroid();
            assert_abs_diff_eq!(d.dot(&d).sqrt(), 0.15, epsilon = 1e-12);
        }
        // the shell spans the training bounding box
        assert!(training.diagonal().unwrap() > 0.3 && training.diagonal().unwrap() < 0.52);
    }

    #[test]
    fn test_training_set_empty_cloud() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(TrainingSet::from_cloud(&empty, &TrainingConfig::default()).is_err());
    }
}
