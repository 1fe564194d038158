use std::path::PathBuf;

use crates::{
    domain::value_objects::{storage::UploadTarget, streams::SelectionPolicy},
    infra::{
        fetchers::http::FetcherConfig, inference::vertex::VertexConfig,
        storages::s3::S3Config, video_sources::yt_dlp::YtDlpConfig,
    },
};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub storage: Storage,
    pub inference: VertexConfig,
    pub pipeline: Pipeline,
    /// Non-fatal problems, logged once tracing is up.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Storage {
    pub s3: S3Config,
    pub target: UploadTarget,
    pub retain_uploads: bool,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub selection: SelectionPolicy,
    pub scratch_dir: PathBuf,
    pub yt_dlp: YtDlpConfig,
    pub fetcher: FetcherConfig,
}
