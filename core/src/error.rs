//! Error types for migx-rs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migx-rs operations.
pub type Result<T> = std::result::Result<T, MigxError>;

/// Errors raised while compiling models, preparing inputs and running sweeps.
#[derive(Debug, Error)]
pub enum MigxError {
    /// Model parsing or compilation failed.
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    /// Inference failed.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Invalid tensor.
    #[error("Invalid tensor: {0}")]
    Tensor(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decoding or preprocessing failed.
    #[error("Image error: {0}")]
    Image(String),

    /// Label table could not be fetched or parsed.
    #[error("Label table error: {0}")]
    Labels(String),

    /// Malformed manifest line.
    #[error("Manifest line {line}: {reason}")]
    Manifest { line: usize, reason: String },

    /// Model input shape has no matching preprocessing pipeline.
    #[error("Expecting either 1x3x224x224 or 1x3x299x299 input format, got {0:?}")]
    UnsupportedShape(Vec<usize>),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl MigxError {
    /// Create a model load error.
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create an inference error.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a tensor error.
    pub fn tensor(msg: impl Into<String>) -> Self {
        Self::Tensor(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an image error.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a label table error.
    pub fn labels(msg: impl Into<String>) -> Self {
        Self::Labels(msg.into())
    }

    /// Create a manifest error for a 1-based line number.
    pub fn manifest(line: usize, reason: impl Into<String>) -> Self {
        Self::Manifest {
            line,
            reason: reason.into(),
        }
    }
}

impl From<image::ImageError> for MigxError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
