use async_trait::async_trait;

use crate::domain::{errors::PipelineError, value_objects::streams::StreamDescriptor};

/// Read-only lookup of the streams available for a source video.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    async fn list_streams(&self, video_url: &str) -> Result<Vec<StreamDescriptor>, PipelineError>;
}
