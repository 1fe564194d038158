use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// Vertical resolution of a video stream in pixels (`720` is "720p").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resolution(pub u32);

impl Resolution {
    pub fn height(&self) -> u32 {
        self.0
    }

    pub fn distance(&self, other: Resolution) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('p')
            .or_else(|| trimmed.strip_suffix('P'))
            .unwrap_or(trimmed);
        let height: u32 = digits
            .parse()
            .with_context(|| format!("invalid resolution: {s}"))?;
        if height == 0 {
            bail!("invalid resolution: {s}");
        }
        Ok(Resolution(height))
    }
}

/// Where the bytes of a stream can be retrieved from. Opaque to everything
/// except the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl SourceHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }
}

/// One encoded variant of a source video, as listed by the video catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub format_id: String,
    pub resolution: Option<Resolution>,
    /// Audio and video muxed in one container.
    pub is_progressive: bool,
    pub container_format: String,
    pub source_handle: SourceHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionTieBreak {
    /// Closest resolution below the target first, then closest above.
    #[default]
    PreferBelow,
    PreferAbove,
}

impl FromStr for ResolutionTieBreak {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "below" | "prefer_below" | "lower" => Ok(ResolutionTieBreak::PreferBelow),
            "above" | "prefer_above" | "higher" => Ok(ResolutionTieBreak::PreferAbove),
            other => bail!("invalid resolution tie break: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub target: Resolution,
    pub tie_break: ResolutionTieBreak,
    pub preferred_container: Option<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            target: Resolution(720),
            tie_break: ResolutionTieBreak::PreferBelow,
            preferred_container: Some("mp4".to_string()),
        }
    }
}
