//! Implicit surface reconstruction of objects from point clouds, and atlases
//! of tangent charts over the reconstructed surface.
//!
//! The workflow follows the [`pipeline`] module:
//! * an object cloud is turned into a labelled [`TrainingSet`] (centroid inside,
//!   cloud on the surface, a surrounding sphere outside),
//! * a [`gpatlas_gp::GaussianProcess`] is fitted on it with value and gradient
//!   observations,
//! * the zero level-set is sampled on a grid and [`gpatlas_atlas::Atlas`] charts
//!   are seeded or grown on it.
//!
//! Settings are grouped in [`GpatlasConfig`], loadable from json.
#![warn(missing_docs)]

pub mod cloud;
pub mod config;
mod errors;
pub mod pipeline;
mod report;
mod training;

pub use config::{CovarianceSpec, GpatlasConfig};
pub use errors::*;
pub use pipeline::{ModelBuilder, SurfaceModel};
pub use report::*;
pub use training::*;

/// Env variable to set the log level, `info` by default
pub const GPATLAS_LOG: &str = "GPATLAS_LOG";
