// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型 (Error types for the detection pipeline)

use thiserror::Error;

/// Result type alias for the pipeline library
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can end a pipeline run or reject its configuration
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Execution backend {backend} is not available on this machine")]
    BackendUnavailable { backend: String },

    #[error("Rendering surface error: {0}")]
    Surface(String),

    #[error("Worker thread `{0}` panicked")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
}

impl PipelineError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Self::Capture(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn preprocess<S: Into<String>>(msg: S) -> Self {
        Self::Preprocess(msg.into())
    }

    pub fn surface<S: Into<String>>(msg: S) -> Self {
        Self::Surface(msg.into())
    }
}
