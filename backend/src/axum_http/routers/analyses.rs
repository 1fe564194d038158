use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, Utc};
use crates::{
    application::usecases::video_analysis::VideoAnalysisUseCase,
    domain::{
        repositories::{
            analyzer::AnalyzerClient, fetcher::StreamFetcher, storage::ObjectStorage,
            video_catalog::VideoCatalog,
        },
        value_objects::{analysis::AnalysisResult, video_url::normalize_video_url},
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::axum_http::error_responses::AppError;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub video_url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub video_url: String,
    pub result: AnalysisResult,
    pub analyzed_at: DateTime<Utc>,
}

pub fn routes<C, F, S, A>(usecase: Arc<VideoAnalysisUseCase<C, F, S, A>>) -> Router
where
    C: VideoCatalog + 'static,
    F: StreamFetcher + 'static,
    S: ObjectStorage + 'static,
    A: AnalyzerClient + 'static,
{
    Router::new()
        .route("/", post(analyze::<C, F, S, A>))
        .with_state(usecase)
}

pub async fn analyze<C, F, S, A>(
    State(usecase): State<Arc<VideoAnalysisUseCase<C, F, S, A>>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError>
where
    C: VideoCatalog + 'static,
    F: StreamFetcher + 'static,
    S: ObjectStorage + 'static,
    A: AnalyzerClient + 'static,
{
    let video_url =
        normalize_video_url(&request.video_url).map_err(|err| AppError::BadRequest(err.to_string()))?;

    info!(%video_url, "analyses: request accepted");
    let result = usecase.analyze_video(video_url.as_str()).await?;

    Ok(Json(AnalyzeResponse {
        video_url: video_url.to_string(),
        result,
        analyzed_at: Utc::now(),
    }))
}
