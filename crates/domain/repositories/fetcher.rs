use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    errors::PipelineError,
    value_objects::{artifacts::FetchedArtifact, streams::StreamDescriptor},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Retrieves the stream's bytes into a new file under `destination_dir`.
    /// A zero-byte result is a `PipelineError::Download`.
    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        destination_dir: &Path,
    ) -> Result<FetchedArtifact, PipelineError>;
}
