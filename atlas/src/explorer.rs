use crate::atlas::Atlas;
use crate::errors::Result;
use crate::policies::ExplorationPolicy;
use log::info;
use ndarray::{ArrayBase, Data, Ix1};
use std::time::Instant;

/// Outcome of an exploration run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exploration {
    /// Chart ids from the root to the last created chart
    pub path: Vec<usize>,
    /// Whether the last chart is a solution of the policy
    pub solved: bool,
}

/// Grows an atlas chart after chart from a seed point, each new chart being
/// connected as a child of the one it was grown from.
#[derive(Debug)]
pub struct Explorer<'a, P: ExplorationPolicy> {
    atlas: Atlas<'a>,
    policy: P,
}

impl<'a, P: ExplorationPolicy> Explorer<'a, P> {
    /// Constructor
    pub fn new(atlas: Atlas<'a>, policy: P) -> Self {
        Explorer { atlas, policy }
    }

    /// Grown atlas
    pub fn atlas(&self) -> &Atlas<'a> {
        &self.atlas
    }

    /// Exploration policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Give back the grown atlas
    pub fn into_atlas(self) -> Atlas<'a> {
        self.atlas
    }

    /// Create a root chart at `seed`, then grow children until the policy
    /// flags a solution or the atlas holds `max_nodes` charts.
    pub fn explore(
        &mut self,
        seed: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        max_nodes: usize,
    ) -> Result<Exploration> {
        let now = Instant::now();
        let mut current = self.atlas.create_node(seed)?;
        let mut path = vec![current];
        let mut solved = self.policy.is_solution(&self.atlas, current)?;
        while !solved && self.atlas.count_nodes() < max_nodes {
            let next = self.policy.next_state(&self.atlas, current)?;
            let child = self.atlas.create_node(&next)?;
            self.atlas.connect(current, child)?;
            path.push(child);
            current = child;
            solved = self.policy.is_solution(&self.atlas, current)?;
        }
        info!(
            "exploration: {} charts, solved={} ({}ms)",
            path.len(),
            solved,
            now.elapsed().as_millis()
        );
        Ok(Exploration { path, solved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasParams;
    use crate::policies::{NearestUnexplored, RandomFrontier};
    use crate::test_utils::SphereSurface;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_explore_until_budget() {
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let params = AtlasParams {
            radius: 0.1,
            ..Default::default()
        };
        let atlas = Atlas::new(&sphere, params);
        let mut explorer = Explorer::new(atlas, RandomFrontier::new(10.).with_seed(0));
        let res = explorer.explore(&array![0., 0., 1.5], 6).unwrap();
        assert!(!res.solved);
        assert_eq!(res.path, vec![0, 1, 2, 3, 4, 5]);

        let atlas = explorer.into_atlas();
        assert_eq!(atlas.count_nodes(), 6);
        for w in res.path.windows(2) {
            assert_eq!(atlas.get_connections(w[0]).unwrap(), &[w[1]]);
        }
        for chart in atlas.charts() {
            let c = chart.center();
            assert_abs_diff_eq!(c.dot(c).sqrt(), 1., epsilon = 1e-2);
        }
    }

    #[test]
    fn test_explore_until_solution() {
        // variance of the mock surface grows along +x, reaching 1.5 at x = 0.5
        let sphere = SphereSurface::new([0., 0., 0.], 1.);
        let params = AtlasParams {
            radius: 0.2,
            ..Default::default()
        };
        let atlas = Atlas::new(&sphere, params);
        let mut explorer = Explorer::new(atlas, NearestUnexplored::new(1.5, 12).unwrap());
        let res = explorer.explore(&array![0., 0., 2.], 50).unwrap();
        assert!(res.solved);
        assert!(res.path.len() > 1 && res.path.len() < 50);
        let last = explorer.atlas().get_node(*res.path.last().unwrap()).unwrap();
        assert!(last.center()[0] >= 0.5);
    }
}
