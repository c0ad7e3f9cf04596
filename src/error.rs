//! Error types for mel2wav

use thiserror::Error;

/// Main error type for mel2wav
#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Model loading error: {0}")]
    ModelLoading(String),

    #[error("Model inference error: {0}")]
    Inference(String),

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for mel2wav operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short label used when summarising failed batch items
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Shape(_) => "shape",
            Error::ModelLoading(_) => "model-load",
            Error::Inference(_) => "inference",
            Error::Audio(_) => "audio",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::FileNotFound(_) => "io",
            Error::InvalidFormat(_) => "format",
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Error::Io(e),
            other => Error::Audio(other.to_string()),
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err.to_string())
    }
}

impl From<safetensors::SafeTensorError> for Error {
    fn from(err: safetensors::SafeTensorError) -> Self {
        Error::InvalidFormat(format!("safetensors: {}", err))
    }
}
