use crate::chart::Chart;
use crate::errors::{AtlasError, Result};
use crate::projection::{project, Projection, ProjectionParams};
use crate::surface::ImplicitSurface;
use log::debug;
use ndarray::{s, Array1, ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default chart radius
pub const CHART_RADIUS: f64 = 0.03;

/// Atlas settings
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize), serde(default))]
pub struct AtlasParams {
    /// Radius of created charts
    pub radius: f64,
    /// Whether chart centers are projected onto the surface at creation
    pub project_on_create: bool,
    /// Projection settings used at chart creation
    pub projection: ProjectionParams,
}

impl Default for AtlasParams {
    fn default() -> Self {
        AtlasParams {
            radius: CHART_RADIUS,
            project_on_create: true,
            projection: ProjectionParams::default(),
        }
    }
}

/// Charts covering an implicit surface, connected parent to child.
///
/// Chart ids are dense insertion indices. The surface model is borrowed: the
/// atlas cannot outlive the pipeline owning it, and the model cannot be
/// mutated while the atlas holds it.
pub struct Atlas<'a> {
    model: Option<&'a dyn ImplicitSurface>,
    params: AtlasParams,
    charts: Vec<Chart>,
    connections: HashMap<usize, Vec<usize>>,
}

impl<'a> fmt::Debug for Atlas<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Atlas")
            .field("has_model", &self.model.is_some())
            .field("params", &self.params)
            .field("charts", &self.charts.len())
            .field("connections", &self.connections)
            .finish()
    }
}

impl<'a> Atlas<'a> {
    /// Empty atlas over `model`
    pub fn new(model: &'a dyn ImplicitSurface, params: AtlasParams) -> Self {
        Atlas {
            model: Some(model),
            params,
            charts: Vec::new(),
            connections: HashMap::new(),
        }
    }

    /// Empty atlas without model, see [`Atlas::set_model`]
    pub fn detached(params: AtlasParams) -> Self {
        Atlas {
            model: None,
            params,
            charts: Vec::new(),
            connections: HashMap::new(),
        }
    }

    /// Attach a surface model
    pub fn set_model(&mut self, model: &'a dyn ImplicitSurface) {
        self.model = Some(model);
    }

    /// Surface model, fails when none is attached
    pub fn model(&self) -> Result<&'a dyn ImplicitSurface> {
        self.model
            .ok_or_else(|| AtlasError::Uninitialized("atlas has no surface model".to_string()))
    }

    /// Settings
    pub fn params(&self) -> &AtlasParams {
        &self.params
    }

    /// Number of charts
    pub fn count_nodes(&self) -> usize {
        self.charts.len()
    }

    /// Charts in id order
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Chart of given id
    pub fn get_node(&self, id: usize) -> Result<&Chart> {
        self.charts.get(id).ok_or(AtlasError::OutOfRange(id))
    }

    /// Children of chart `id`, empty when it has none
    pub fn get_connections(&self, id: usize) -> Result<&[usize]> {
        self.get_node(id)?;
        Ok(self
            .connections
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Directed edges as `parent -> children`
    pub fn connections(&self) -> &HashMap<usize, Vec<usize>> {
        &self.connections
    }

    /// Record `child` as connected to `parent`. Only the `parent -> child`
    /// direction is stored; recording an existing edge again is a no-op.
    pub fn connect(&mut self, parent: usize, child: usize) -> Result<()> {
        self.get_node(parent)?;
        self.get_node(child)?;
        if parent == child {
            return Err(AtlasError::InvalidValue(format!(
                "chart {parent} cannot be connected to itself"
            )));
        }
        let children = self.connections.entry(parent).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
        Ok(())
    }

    /// Walk `input` toward the surface along `direction`, see [`project`]
    pub fn project(
        &self,
        input: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        direction: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        params: &ProjectionParams,
    ) -> Result<Projection> {
        project(self.model()?, input, direction, params)
    }

    /// Create a chart at `center` and return its id.
    ///
    /// When `project_on_create` is set, the center is first projected onto the
    /// surface with Newton steps along the local gradient. The chart frame and
    /// variance are evaluated at the final center.
    pub fn create_node(
        &mut self,
        center: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<usize> {
        let model = self.model()?;
        if center.len() != 3 {
            return Err(AtlasError::InvalidValue(format!(
                "chart center should be a 3D point, got {center}"
            )));
        }
        let mut center: Array1<f64> = center.to_owned();
        let mut fx = model.evaluate(center.view())?;
        if self.params.project_on_create {
            let g = fx.slice(s![1..]);
            let g2 = g.dot(&g);
            if !(g2 > f64::EPSILON) {
                return Err(AtlasError::InvalidValue(format!(
                    "surface gradient vanishes at {center}, cannot project"
                )));
            }
            let direction = g.mapv(|v| v / g2);
            let projection = project(model, &center, &direction, &self.params.projection)?;
            if projection.iterations > 0 {
                center = projection.point;
                fx = model.evaluate(center.view())?;
            }
        }
        let variance = model.variance(center.view())?;
        let id = self.charts.len();
        let chart = Chart::new(&center, id, &fx.slice(s![1..]), self.params.radius, variance)?;
        debug!(
            "chart {} at {} (f={:.3e}, var={:.3e})",
            id, center, fx[0], variance
        );
        self.charts.push(chart);
        Ok(id)
    }

    /// Index of the chart whose center is nearest to `point`
    pub fn nearest_node(&self, point: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Option<usize> {
        self.charts
            .iter()
            .map(|c| {
                let d = point - c.center();
                (c.id(), d.dot(&d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Whether `point` falls inside the disc of some chart
    pub fn is_covered(&self, point: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        self.charts.iter().any(|c| c.contains(point))
    }

    /// Drop every chart and edge and detach the surface model
    pub fn clear(&mut self) {
        self.charts.clear();
        self.connections.clear();
        self.model = None;
    }
}
