use crate::errors::Result;
use gpatlas_atlas::{Atlas, Chart, Exploration};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Exported chart frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartReport {
    /// Chart id
    pub id: usize,
    /// Surface point the chart is anchored to
    pub center: [f64; 3],
    /// Unit outward normal
    pub normal: [f64; 3],
    /// First tangent vector
    pub tangent_x: [f64; 3],
    /// Second tangent vector
    pub tangent_y: [f64; 3],
    /// Disc radius
    pub radius: f64,
    /// Surface model variance at the center
    pub variance: f64,
}

fn vec3(v: &ndarray::Array1<f64>) -> [f64; 3] {
    [v[0], v[1], v[2]]
}

impl From<&Chart> for ChartReport {
    fn from(chart: &Chart) -> Self {
        ChartReport {
            id: chart.id(),
            center: vec3(chart.center()),
            normal: vec3(chart.normal()),
            tangent_x: vec3(chart.tangent_x()),
            tangent_y: vec3(chart.tangent_y()),
            radius: chart.radius(),
            variance: chart.variance(),
        }
    }
}

/// Read-only export of an atlas for visualisation or planning layers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasReport {
    /// Charts in id order
    pub charts: Vec<ChartReport>,
    /// Directed `(parent, child)` edges sorted by parent then child
    pub edges: Vec<(usize, usize)>,
    /// Chart ids of the exploration path, if any
    pub path: Option<Vec<usize>>,
    /// Whether the exploration reached a solution chart
    pub solved: Option<bool>,
}

impl AtlasReport {
    /// Export of `atlas`, with the exploration outcome when available
    pub fn new(atlas: &Atlas, exploration: Option<&Exploration>) -> Self {
        let mut edges: Vec<(usize, usize)> = atlas
            .connections()
            .iter()
            .flat_map(|(&parent, children)| children.iter().map(move |&child| (parent, child)))
            .collect();
        edges.sort_unstable();
        AtlasReport {
            charts: atlas.charts().iter().map(ChartReport::from).collect(),
            edges,
            path: exploration.map(|e| e.path.clone()),
            solved: exploration.map(|e| e.solved),
        }
    }

    /// Write as pretty json
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read from json
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
