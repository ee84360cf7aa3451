use thiserror::Error;

/// A result type for atlas errors
pub type Result<T> = std::result::Result<T, AtlasError>;

/// An error for chart atlas operations
#[derive(Error, Debug)]
pub enum AtlasError {
    /// When a chart id does not belong to the atlas
    #[error("Chart id {0} out of range")]
    OutOfRange(usize),
    /// When the atlas has no surface model attached
    #[error("Uninitialized: {0}")]
    Uninitialized(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When the surface model fails
    #[error("GP error")]
    GpError(#[from] gpatlas_gp::GpError),
}
