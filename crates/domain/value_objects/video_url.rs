use anyhow::{Result, anyhow, bail};
use url::Url;

pub const MAX_VIDEO_URL_LEN: usize = 2048;

/// A video page URL that is safe to hand to the stream catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl(String);

impl VideoUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_video_url(raw: &str) -> Result<VideoUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Invalid URL: empty input");
    }
    if trimmed.len() > MAX_VIDEO_URL_LEN {
        bail!("Invalid URL: too long");
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        bail!("Invalid URL: contains whitespace or control characters");
    }

    let lowered = trimmed.to_ascii_lowercase();
    let url_occurrences = lowered.matches("http://").count() + lowered.matches("https://").count();
    if url_occurrences > 1 {
        bail!("Invalid URL: multiple URLs detected");
    }

    let url = Url::parse(trimmed).map_err(|err| anyhow!("Invalid URL: {}", err))?;

    // Anything else would let the caller point yt-dlp at local files.
    if url.scheme() != "https" && url.scheme() != "http" {
        bail!("Invalid URL: only http and https schemes are allowed");
    }
    if !url.username().is_empty() || url.password().is_some() {
        bail!("Invalid URL: userinfo is not allowed");
    }
    if url.host_str().is_none_or(str::is_empty) {
        bail!("Invalid URL: missing host");
    }

    Ok(VideoUrl(url.to_string()))
}
