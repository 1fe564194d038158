use async_trait::async_trait;

use crate::domain::{
    errors::PipelineError,
    value_objects::{analysis::RawAnalyzerResponse, storage::RemoteObjectRef},
};

/// Hosted multimodal model, addressed by reference to an uploaded object.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyzerClient: Send + Sync {
    async fn analyze(
        &self,
        object: &RemoteObjectRef,
        prompt: &str,
    ) -> Result<RawAnalyzerResponse, PipelineError>;
}
