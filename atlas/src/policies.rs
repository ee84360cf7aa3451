//! Exploration strategies driving the growth of an atlas.
use crate::atlas::Atlas;
use crate::chart::Chart;
use crate::errors::{AtlasError, Result};
use log::debug;
use ndarray::Array1;
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::f64::consts::PI;

/// Where to grow the atlas from a chart, and when to stop
pub trait ExplorationPolicy {
    /// Candidate center of the next chart grown from chart `id`
    fn next_state(&mut self, atlas: &Atlas, id: usize) -> Result<Array1<f64>>;

    /// Whether chart `id` ends the exploration
    fn is_solution(&self, atlas: &Atlas, id: usize) -> Result<bool>;

    /// Whether `chart` ends the exploration
    fn is_chart_solution(&self, atlas: &Atlas, chart: &Chart) -> Result<bool> {
        self.is_solution(atlas, chart.id())
    }
}

/// Grow toward a uniformly drawn point of the chart rim. A chart is a
/// solution when the surface variance at its center reaches `variance_threshold`.
#[derive(Clone, Debug)]
pub struct RandomFrontier {
    variance_threshold: f64,
    rng: Xoshiro256Plus,
}

impl RandomFrontier {
    /// Constructor with entropy seeded generator
    pub fn new(variance_threshold: f64) -> Self {
        Self::new_with_rng(variance_threshold, Xoshiro256Plus::from_entropy())
    }

    /// Constructor with given generator
    pub fn new_with_rng(variance_threshold: f64, rng: Xoshiro256Plus) -> Self {
        RandomFrontier {
            variance_threshold,
            rng,
        }
    }

    /// Set the random generator seed
    pub fn with_seed(self, seed: u64) -> Self {
        Self::new_with_rng(self.variance_threshold, Xoshiro256Plus::seed_from_u64(seed))
    }
}

impl ExplorationPolicy for RandomFrontier {
    fn next_state(&mut self, atlas: &Atlas, id: usize) -> Result<Array1<f64>> {
        let theta = self.rng.gen_range(0.0..2. * PI);
        Ok(atlas.get_node(id)?.rim_point(theta))
    }

    fn is_solution(&self, atlas: &Atlas, id: usize) -> Result<bool> {
        Ok(atlas.get_node(id)?.variance() >= self.variance_threshold)
    }
}

/// Grow toward the rim point of largest surface variance among `n_candidates`
/// evenly spread ones, skipping those already covered by another chart.
#[derive(Clone, Debug)]
pub struct NearestUnexplored {
    variance_threshold: f64,
    n_candidates: usize,
}

impl NearestUnexplored {
    /// Constructor, fails without candidate
    pub fn new(variance_threshold: f64, n_candidates: usize) -> Result<Self> {
        if n_candidates == 0 {
            return Err(AtlasError::InvalidValue(
                "at least one rim candidate is required".to_string(),
            ));
        }
        Ok(NearestUnexplored {
            variance_threshold,
            n_candidates,
        })
    }

    /// Number of rim candidates
    pub fn n_candidates(&self) -> usize {
        self.n_candidates
    }
}

impl ExplorationPolicy for NearestUnexplored {
    fn next_state(&mut self, atlas: &Atlas, id: usize) -> Result<Array1<f64>> {
        let model = atlas.model()?;
        let chart = atlas.get_node(id)?;
        let candidates: Vec<Array1<f64>> = (0..self.n_candidates)
            .map(|k| chart.rim_point(2. * PI * k as f64 / self.n_candidates as f64))
            .collect();
        let unexplored: Vec<&Array1<f64>> = candidates
            .iter()
            .filter(|p| {
                !atlas
                    .charts()
                    .iter()
                    .filter(|c| c.id() != id)
                    .any(|c| c.contains(*p))
            })
            .collect();
        let pool = if unexplored.is_empty() {
            debug!("rim of chart {} fully covered", id);
            candidates.iter().collect()
        } else {
            unexplored
        };

        let mut best: Option<(f64, &Array1<f64>)> = None;
        for p in pool {
            let var = model.variance(p.view())?;
            if best.map_or(true, |(v, _)| var > v) {
                best = Some((var, p));
            }
        }
        best.map(|(_, p)| p.to_owned())
            .ok_or_else(|| AtlasError::InvalidValue("no rim candidate".to_string()))
    }

    fn is_solution(&self, atlas: &Atlas, id: usize) -> Result<bool> {
        Ok(atlas.get_node(id)?.variance() >= self.variance_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasParams;
    use crate::test_utils::SphereSurface;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_random_frontier() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let mut atlas = Atlas::new(&sphere, AtlasParams::default());
        let id = atlas.create_node(&array![0., 0., 2.]).unwrap();
        let mut policy = RandomFrontier::new(1.5).with_seed(42);

        let chart = atlas.get_node(id).unwrap().clone();
        for _ in 0..10 {
            let next = policy.next_state(&atlas, id).unwrap();
            let d = &next - chart.center();
            assert_abs_diff_eq!(d.dot(&d).sqrt(), chart.radius(), epsilon = 1e-12);
            assert_abs_diff_eq!(d.dot(chart.normal()), 0., epsilon = 1e-12);
        }
        assert!(!policy.is_solution(&atlas, id).unwrap());
        assert!(!policy.is_chart_solution(&atlas, &chart).unwrap());
        assert!(policy.next_state(&atlas, 1).is_err());

        let id = atlas.create_node(&array![2., 0., 0.]).unwrap();
        assert!(policy.is_solution(&atlas, id).unwrap());
    }

    #[test]
    fn test_random_frontier_is_reproducible() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let mut atlas = Atlas::new(&sphere, AtlasParams::default());
        atlas.create_node(&array![0., 2., 0.]).unwrap();
        let mut p1 = RandomFrontier::new(1.).with_seed(7);
        let mut p2 = RandomFrontier::new(1.).with_seed(7);
        assert_eq!(p1.next_state(&atlas, 0).unwrap(), p2.next_state(&atlas, 0).unwrap());
    }

    #[test]
    fn test_nearest_unexplored_picks_largest_variance() {
        // variance grows along +x on the mock surface
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let mut atlas = Atlas::new(&sphere, AtlasParams::default());
        let id = atlas.create_node(&array![0., 0., 2.]).unwrap();
        let mut policy = NearestUnexplored::new(10., 8).unwrap();
        let chart = atlas.get_node(id).unwrap().clone();
        let best_x = (0..8)
            .map(|k| chart.rim_point(2. * PI * k as f64 / 8.)[0])
            .fold(f64::MIN, f64::max);
        let next = policy.next_state(&atlas, id).unwrap();
        assert_abs_diff_eq!(next[0], best_x, epsilon = 1e-12);

        // covering the +x side of the rim pushes the choice elsewhere
        atlas.create_node(&array![chart.radius(), 0., 1.]).unwrap();
        let next = policy.next_state(&atlas, id).unwrap();
        assert!(next[0] < best_x - 1e-6);
        assert!(!atlas.charts()[1].contains(&next));
    }

    #[test]
    fn test_nearest_unexplored_invalid() {
        assert!(NearestUnexplored::new(1., 0).is_err());
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let atlas = Atlas::new(&sphere, AtlasParams::default());
        let mut policy = NearestUnexplored::new(1., 4).unwrap();
        assert!(matches!(
            policy.next_state(&atlas, 0),
            Err(AtlasError::OutOfRange(0))
        ));
    }
}
