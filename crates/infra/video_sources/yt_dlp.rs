use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{error, info};

use crate::domain::{
    errors::PipelineError,
    repositories::video_catalog::VideoCatalog,
    value_objects::streams::{Resolution, SourceHandle, StreamDescriptor},
};

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary: String,
    pub timeout_secs: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Lists the formats of a video by asking `yt-dlp` for its info JSON.
pub struct YtDlpCatalog {
    config: YtDlpConfig,
}

impl YtDlpCatalog {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    fn info_command(&self, video_url: &str) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            // Ends option parsing so the URL is never read as a flag.
            .arg("--")
            .arg(video_url)
            .kill_on_drop(true);
        command
    }

    async fn dump_info_json(&self, video_url: &str) -> Result<String> {
        let mut command = self.info_command(video_url);

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| anyhow!("yt-dlp timed out after {}s", self.config.timeout_secs))?
        .with_context(|| format!("failed to run {}", self.config.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                %video_url,
                status = %output.status,
                stderr = %stderr.trim(),
                "yt_dlp: info extraction failed"
            );
            bail!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        }

        String::from_utf8(output.stdout).context("yt-dlp output is not valid UTF-8")
    }
}

#[async_trait]
impl VideoCatalog for YtDlpCatalog {
    async fn list_streams(&self, video_url: &str) -> Result<Vec<StreamDescriptor>, PipelineError> {
        let json = self
            .dump_info_json(video_url)
            .await
            .map_err(PipelineError::Download)?;

        let streams = parse_info_json(&json)
            .context("failed to parse yt-dlp info JSON")
            .map_err(PipelineError::Download)?;

        info!(%video_url, count = streams.len(), "yt_dlp: streams listed");
        Ok(streams)
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    formats: Option<Vec<FormatJson>>,
    #[serde(flatten)]
    single: FormatJson,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: Option<String>,
    url: Option<String>,
    ext: Option<String>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
    protocol: Option<String>,
    format_note: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

/// Maps yt-dlp's info JSON to stream descriptors, in yt-dlp's format order.
///
/// Entries that can't be fetched with a single HTTP GET (HLS/DASH fragments,
/// storyboards, entries without a URL) are dropped.
pub fn parse_info_json(json: &str) -> Result<Vec<StreamDescriptor>> {
    let info: InfoJson = serde_json::from_str(json)?;

    let formats = match info.formats {
        Some(formats) if !formats.is_empty() => formats,
        _ => vec![info.single],
    };

    Ok(formats.into_iter().filter_map(into_descriptor).collect())
}

fn into_descriptor(format: FormatJson) -> Option<StreamDescriptor> {
    let url = format.url.filter(|u| !u.is_empty())?;

    let protocol = format.protocol.as_deref().unwrap_or("https");
    if protocol != "http" && protocol != "https" {
        return None;
    }

    let ext = format.ext.unwrap_or_else(|| "mp4".to_string());
    let is_storyboard = ext == "mhtml"
        || format
            .format_note
            .as_deref()
            .is_some_and(|note| note.eq_ignore_ascii_case("storyboard"));
    if is_storyboard {
        return None;
    }

    let has_video = format.vcodec.as_deref() != Some("none");
    let has_audio = format.acodec.as_deref() != Some("none");

    Some(StreamDescriptor {
        format_id: format.format_id.unwrap_or_else(|| "default".to_string()),
        resolution: if has_video {
            format.height.filter(|h| *h > 0).map(Resolution)
        } else {
            None
        },
        is_progressive: has_video && has_audio,
        container_format: ext,
        source_handle: SourceHandle {
            url,
            headers: format.http_headers,
        },
    })
}
