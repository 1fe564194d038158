use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use mime_guess::MimeGuess;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    errors::PipelineError,
    repositories::fetcher::StreamFetcher,
    value_objects::{artifacts::FetchedArtifact, streams::StreamDescriptor},
};

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Downloads larger than this are aborted.
    pub max_bytes: Option<u64>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 600,
            max_bytes: None,
        }
    }
}

/// Streams a selected format straight from its source URL to scratch storage.
pub struct HttpStreamFetcher {
    client: reqwest::Client,
    max_bytes: Option<u64>,
}

impl HttpStreamFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("video-insight/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build download client")?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    async fn download_to(&self, descriptor: &StreamDescriptor, dest: &Path) -> Result<String> {
        let headers = request_headers(descriptor)?;
        let response = self
            .client
            .get(&descriptor.source_handle.url)
            .headers(headers)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("source returned an error status")?;

        let content_type = content_type_for(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            &descriptor.container_format,
        );

        if let (Some(limit), Some(length)) = (self.max_bytes, response.content_length()) {
            if length > limit {
                bail!("stream is {length} bytes, over the {limit} byte limit");
            }
        }

        let mut file = fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await.transpose().context("stream error")? {
            written += chunk.len() as u64;
            if let Some(limit) = self.max_bytes {
                if written > limit {
                    bail!("stream exceeded the {limit} byte limit");
                }
            }
            file.write_all(&chunk)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
        }
        file.flush().await?;

        Ok(content_type)
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        destination_dir: &Path,
    ) -> Result<FetchedArtifact, PipelineError> {
        fs::create_dir_all(destination_dir)
            .await
            .with_context(|| format!("failed to create {}", destination_dir.display()))
            .map_err(PipelineError::Download)?;

        let dest = scratch_path(destination_dir, &descriptor.container_format);
        info!(
            format_id = %descriptor.format_id,
            path = %dest.display(),
            "http_fetcher: downloading stream"
        );

        // Armed before the file exists, so an error or a cancelled future
        // both leave the scratch directory clean.
        let partial = PartialDownload::new(dest);

        let content_type = self
            .download_to(descriptor, partial.path())
            .await
            .with_context(|| format!("failed to download format {}", descriptor.format_id))
            .map_err(PipelineError::Download)?;

        FetchedArtifact::adopt(partial.into_path(), content_type)
            .await
            .map_err(PipelineError::Download)
    }
}

/// Scratch file that is removed on drop until the artifact takes it over.
struct PartialDownload {
    path: PathBuf,
    armed: bool,
}

impl PartialDownload {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn into_path(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "failed to remove partial download: {err:?}");
            }
        }
    }
}

fn request_headers(descriptor: &StreamDescriptor) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &descriptor.source_handle.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name {name}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header {name}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn scratch_path(dir: &Path, container: &str) -> PathBuf {
    let ext = if !container.is_empty() && container.chars().all(|c| c.is_ascii_alphanumeric()) {
        container
    } else {
        "bin"
    };
    dir.join(format!("{}.{}", Uuid::new_v4(), ext))
}

/// The response header wins when it names a media type; generic types like
/// `application/octet-stream` fall back to a guess from the container.
fn content_type_for(header: Option<&str>, container: &str) -> String {
    if let Some(header) = header {
        let essence = header.split(';').next().unwrap_or_default().trim();
        if essence.starts_with("video/") || essence.starts_with("audio/") {
            return essence.to_ascii_lowercase();
        }
    }

    MimeGuess::from_ext(container)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
