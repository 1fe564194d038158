use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use crates::{
    domain::value_objects::{
        storage::UploadTarget,
        streams::{Resolution, ResolutionTieBreak, SelectionPolicy},
    },
    infra::{
        fetchers::http::FetcherConfig, inference::vertex::VertexConfig, storages::s3::S3Config,
        video_sources::yt_dlp::YtDlpConfig,
    },
};

use super::config_model::{BackendServer, DotEnvyConfig, Pipeline, Storage};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let vars: HashMap<String, String> = std::env::vars().collect();
    from_vars(&vars)
}

pub fn from_vars(vars: &HashMap<String, String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| {
        vars.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let var_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

    let mut warnings = Vec::new();

    let backend_server = BackendServer {
        port: var_or("SERVER_PORT", "8080")
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: var_or("SERVER_BODY_LIMIT", "1")
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: var_or("SERVER_TIMEOUT", "1800")
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let bucket = var_or("GCS_BUCKET_NAME", "");
    if bucket.is_empty() {
        warnings.push("GCS_BUCKET_NAME is not set; every upload will fail".to_string());
    }

    let s3 = S3Config::new(
        var_or("STORAGE_S3_ENDPOINT", "https://storage.googleapis.com"),
        var_or("STORAGE_S3_REGION", "auto"),
        var_or("STORAGE_S3_ACCESS_KEY_ID", ""),
        var_or("STORAGE_S3_SECRET_ACCESS_KEY", ""),
    );
    if s3.access_key.is_empty() || s3.secret_key.is_empty() {
        warnings.push("STORAGE_S3_ACCESS_KEY_ID or STORAGE_S3_SECRET_ACCESS_KEY is not set".to_string());
    }

    let storage = Storage {
        s3,
        target: UploadTarget {
            bucket,
            key_prefix: var_or("STORAGE_KEY_PREFIX", "video-uploads"),
            uri_scheme: var_or("STORAGE_URI_SCHEME", "gs"),
        },
        retain_uploads: parse_bool(&var_or("STORAGE_RETAIN_UPLOADS", "false"))
            .context("STORAGE_RETAIN_UPLOADS is invalid")?,
    };

    let project_id = var_or("PROJECT_ID", "");
    if project_id.is_empty() {
        warnings.push("PROJECT_ID is not set; every analysis will fail".to_string());
    }

    let inference = VertexConfig {
        endpoint: var("VERTEX_ENDPOINT"),
        access_token: var("VERTEX_ACCESS_TOKEN"),
        timeout_secs: var_or("VERTEX_TIMEOUT_SECS", "600")
            .parse()
            .context("VERTEX_TIMEOUT_SECS is invalid")?,
        temperature: Some(
            var_or("VERTEX_TEMPERATURE", "0.0")
                .parse::<f32>()
                .context("VERTEX_TEMPERATURE is invalid")?,
        ),
        ..VertexConfig::new(
            project_id,
            var_or("GOOGLE_CLOUD_REGION", "us-central1"),
            var_or("GEMINI_MODEL_ID", "gemini-2.5-pro"),
        )
    };

    let selection = SelectionPolicy {
        target: var_or("PREFERRED_RESOLUTION", "720p")
            .parse::<Resolution>()
            .context("PREFERRED_RESOLUTION is invalid")?,
        tie_break: var_or("RESOLUTION_TIE_BREAK", "below")
            .parse::<ResolutionTieBreak>()
            .context("RESOLUTION_TIE_BREAK is invalid")?,
        preferred_container: var("PREFERRED_CONTAINER")
            .or_else(|| Some("mp4".to_string()))
            .filter(|c| !c.eq_ignore_ascii_case("any")),
    };

    let pipeline = Pipeline {
        selection,
        scratch_dir: var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("video-analysis")),
        yt_dlp: YtDlpConfig {
            binary: var_or("YT_DLP_BIN", "yt-dlp"),
            timeout_secs: var_or("YT_DLP_TIMEOUT_SECS", "120")
                .parse()
                .context("YT_DLP_TIMEOUT_SECS is invalid")?,
        },
        fetcher: FetcherConfig {
            timeout_secs: var_or("DOWNLOAD_TIMEOUT_SECS", "600")
                .parse()
                .context("DOWNLOAD_TIMEOUT_SECS is invalid")?,
            max_bytes: var("DOWNLOAD_MAX_BYTES")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("DOWNLOAD_MAX_BYTES is invalid")?,
            ..FetcherConfig::default()
        },
    };

    let stage_budget = pipeline.yt_dlp.timeout_secs
        + pipeline.fetcher.timeout_secs
        + storage.s3.read_timeout_secs
        + inference.timeout_secs;
    if backend_server.timeout <= stage_budget {
        anyhow::bail!(
            "SERVER_TIMEOUT ({}s) must exceed the sum of the stage timeouts ({stage_budget}s)",
            backend_server.timeout
        );
    }

    Ok(DotEnvyConfig {
        backend_server,
        storage,
        inference,
        pipeline,
        warnings,
    })
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
