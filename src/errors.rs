use thiserror::Error;

/// A result type for gpatlas errors
pub type Result<T> = std::result::Result<T, GpatlasError>;

/// An error for surface model building
#[derive(Error, Debug)]
pub enum GpatlasError {
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When the object point cloud is empty or malformed
    #[error("Invalid cloud: {0}")]
    InvalidCloudError(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValueError(String),
    /// When GP regression fails
    #[error("GP error")]
    GpError(#[from] gpatlas_gp::GpError),
    /// When atlas building fails
    #[error("Atlas error")]
    AtlasError(#[from] gpatlas_atlas::AtlasError),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    /// When numpy array read fails
    #[error("IO error")]
    ReadNpyError(#[from] ndarray_npy::ReadNpyError),
    /// When numpy array write fails
    #[error("IO error")]
    WriteNpyError(#[from] ndarray_npy::WriteNpyError),
    /// When json (de)serialization fails
    #[error("Json error")]
    JsonError(#[from] serde_json::Error),
}
