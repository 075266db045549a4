use thiserror::Error;

/// Errors produced while loading or validating scan data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Ply(String),

    #[error("Missing '{property}' at vertex {index}")]
    MissingProperty { property: &'static str, index: usize },

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}
