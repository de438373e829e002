use std::path::PathBuf;
use thiserror::Error;

/// Every failure surfaced by the detector.
///
/// Setup errors come out of [`crate::Detector::new`]; per-call errors come out of
/// [`crate::Detector::detect`]. Empty results are never an error.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to read class names from {path}: {source}")]
    ClassNames {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model I/O is incompatible: {0}")]
    ModelShape(String),

    #[error("image {index} is malformed ({width}x{height})")]
    MalformedImage { index: usize, width: u32, height: u32 },

    #[error("batch of {got} images exceeds the model batch size {max}")]
    BatchTooLarge { got: usize, max: usize },

    #[error("preprocessing failed: {0:#}")]
    Preprocess(anyhow::Error),

    #[error("inference session failed: {0:#}")]
    Session(anyhow::Error),

    #[error("output tensor `{name}` has {got} elements, expected {expected}")]
    OutputShape {
        name: String,
        got: usize,
        expected: usize,
    },
}

impl DetectError {
    /// Stable non-zero return code for callers that speak in status codes.
    pub fn code(&self) -> i32 {
        match self {
            DetectError::ClassNames { .. } => 1,
            DetectError::Config(_) => 2,
            DetectError::ModelShape(_) => 3,
            DetectError::MalformedImage { .. } => 10,
            DetectError::BatchTooLarge { .. } => 11,
            DetectError::Preprocess(_) => 12,
            DetectError::Session(_) => 13,
            DetectError::OutputShape { .. } => 14,
        }
    }

    /// `true` for failures that can only happen while building a detector.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            DetectError::ClassNames { .. } | DetectError::Config(_) | DetectError::ModelShape(_)
        )
    }
}
