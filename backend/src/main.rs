use anyhow::{Context, Result};
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::{
    application::{
        prompts,
        uploader::Uploader,
        usecases::video_analysis::{AnalysisSettings, VideoAnalysisUseCase},
    },
    infra::{
        fetchers::http::HttpStreamFetcher, inference::vertex::VertexAnalyzerClient,
        storages::object_storage::S3ObjectStorage, video_sources::yt_dlp::YtDlpCatalog,
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let mut dotenvy_env = config_loader::load()?;
    for warning in &dotenvy_env.warnings {
        warn!(warning = %warning, "Config warning");
    }
    info!("ENV has been loaded");

    dotenvy_env.inference.response_schema = Some(prompts::stock_broadcast_response_schema());

    let catalog = YtDlpCatalog::new(dotenvy_env.pipeline.yt_dlp.clone());
    let fetcher = HttpStreamFetcher::new(&dotenvy_env.pipeline.fetcher)?;
    let storage = S3ObjectStorage::new(&dotenvy_env.storage.s3)
        .await
        .context("failed to initialize object storage")?;
    let analyzer = VertexAnalyzerClient::new(&dotenvy_env.inference)?;
    info!(
        bucket = %dotenvy_env.storage.target.bucket,
        model = %dotenvy_env.inference.model,
        "Pipeline adapters are ready"
    );

    let usecase = VideoAnalysisUseCase::new(
        Arc::new(catalog),
        Arc::new(fetcher),
        Uploader::new(Arc::new(storage), &dotenvy_env.storage.target),
        Arc::new(analyzer),
        AnalysisSettings {
            selection: dotenvy_env.pipeline.selection.clone(),
            scratch_dir: dotenvy_env.pipeline.scratch_dir.clone(),
            prompt: prompts::STOCK_BROADCAST_PROMPT.to_string(),
            schema: prompts::stock_broadcast_schema(),
            retain_uploads: dotenvy_env.storage.retain_uploads,
        },
    );

    http_serve::start(Arc::new(dotenvy_env), Arc::new(usecase)).await?;

    Ok(())
}
