use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification surfaced to callers so each failure class can be rendered
/// distinctly (configuration vs. network vs. unreliable model output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoStreamAvailable,
    DownloadError,
    UploadError,
    ConfigurationError,
    InferenceError,
    MalformedResponse,
    SchemaError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            ErrorKind::NoStreamAvailable => "no_stream_available",
            ErrorKind::DownloadError => "download_error",
            ErrorKind::UploadError => "upload_error",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::InferenceError => "inference_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::SchemaError => "schema_error",
        };
        write!(f, "{}", value)
    }
}

/// Hard failures of a pipeline stage. Each stage propagates its own error
/// unchanged; nothing downstream catches and retries.
///
/// Analyzer output problems (`MalformedResponse`, `SchemaError`) are not here:
/// they are reported inside the `AnalysisResult` by the normalizer.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no downloadable stream is available for this video")]
    NoStreamAvailable,

    #[error("download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("upload failed: {0:#}")]
    Upload(anyhow::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NoStreamAvailable => ErrorKind::NoStreamAvailable,
            PipelineError::Download(_) => ErrorKind::DownloadError,
            PipelineError::Upload(_) => ErrorKind::UploadError,
            PipelineError::Configuration(_) => ErrorKind::ConfigurationError,
            PipelineError::Inference(_) => ErrorKind::InferenceError,
        }
    }
}
