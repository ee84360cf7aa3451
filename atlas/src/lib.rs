//! Atlases of tangent charts covering the zero level-set of an implicit
//! surface model, grown chart after chart by exploration policies.
//!
//! The surface is any [`ImplicitSurface`], typically a
//! [`gpatlas_gp::GaussianProcess`] trained on labelled points. An [`Atlas`]
//! borrows it to project chart centers onto the surface and evaluate their
//! tangent frame:
//!
//! ```no_run
//! use gpatlas_atlas::{Atlas, AtlasParams, Explorer, RandomFrontier, SamplerParams, SurfaceSampler};
//! # fn run(gp: &gpatlas_gp::GaussianProcess<f64, gpatlas_gp::ThinPlateCov<f64>>, cloud: &ndarray::Array2<f64>)
//! # -> gpatlas_atlas::Result<()> {
//! let surface_points = SurfaceSampler::from_cloud(cloud, SamplerParams::default())?.sample(gp)?;
//! let atlas = Atlas::new(gp, AtlasParams::default());
//! let mut explorer = Explorer::new(atlas, RandomFrontier::new(0.1).with_seed(42));
//! let exploration = explorer.explore(&surface_points.row(0), 20)?;
//! println!("path {:?}", exploration.path);
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod atlas;
mod chart;
mod errors;
mod explorer;
pub mod policies;
mod projection;
mod sampler;
mod surface;

#[cfg(test)]
mod test_utils;

pub use atlas::*;
pub use chart::*;
pub use errors::*;
pub use explorer::*;
pub use policies::{ExplorationPolicy, NearestUnexplored, RandomFrontier};
pub use projection::*;
pub use sampler::*;
pub use surface::*;
