use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::domain::{
    errors::PipelineError,
    repositories::analyzer::AnalyzerClient,
    value_objects::{analysis::RawAnalyzerResponse, storage::RemoteObjectRef},
};

#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub model: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com/v1`.
    pub endpoint: Option<String>,
    /// Fixed bearer token. When unset, tokens come from Application Default
    /// Credentials and are refreshed as they expire.
    pub access_token: Option<String>,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub response_schema: Option<Value>,
}

impl VertexConfig {
    pub fn new(project_id: String, location: String, model: String) -> Self {
        Self {
            project_id,
            location,
            model,
            endpoint: None,
            access_token: None,
            timeout_secs: 600,
            temperature: Some(0.0),
            max_output_tokens: Some(8192),
            response_schema: None,
        }
    }

    fn base_url(&self) -> String {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => format!("https://{}-aiplatform.googleapis.com/v1", self.location),
        }
    }
}

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

enum Credentials {
    Static(String),
    /// Resolved on first use, so a missing ADC setup only fails analyses.
    ApplicationDefault(OnceCell<Arc<dyn TokenProvider>>),
}

impl Credentials {
    fn from_config(config: &VertexConfig) -> Self {
        match config.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Credentials::Static(token.to_string()),
            _ => Credentials::ApplicationDefault(OnceCell::new()),
        }
    }

    async fn bearer_token(&self) -> Result<String> {
        match self {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ApplicationDefault(provider) => {
                let provider = provider
                    .get_or_try_init(gcp_auth::provider)
                    .await
                    .context("no Google Cloud application default credentials found")?;
                let token = provider
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .context("failed to obtain a Google Cloud access token")?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

/// Gemini on Vertex AI, fed a `gs://` reference instead of inline bytes.
pub struct VertexAnalyzerClient {
    client: reqwest::Client,
    credentials: Credentials,
    config: VertexConfig,
}

impl VertexAnalyzerClient {
    pub fn new(config: &VertexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build vertex http client")?;

        Ok(Self {
            client,
            credentials: Credentials::from_config(config),
            config: config.clone(),
        })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.config.base_url(),
            self.config.project_id.trim(),
            self.config.location,
            self.config.model
        )
    }

    fn build_request(&self, object: &RemoteObjectRef, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part {
                        text: Some(prompt.to_string()),
                        file_data: None,
                    },
                    Part {
                        text: None,
                        file_data: Some(FileData {
                            mime_type: object.content_type().to_string(),
                            file_uri: object.uri().to_string(),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json".to_string(),
                response_schema: self.config.response_schema.clone(),
            },
        }
    }

    async fn generate(&self, object: &RemoteObjectRef, prompt: &str) -> Result<RawAnalyzerResponse> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .client
            .post(self.generate_content_url())
            .bearer_auth(token)
            .json(&self.build_request(object, prompt))
            .send()
            .await
            .context("request failed")?;
        let status = response.status();
        let body = response.text().await.context("failed to read response")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| {
                    format!(
                        "{} ({})",
                        e.error.message,
                        e.error.status.as_deref().unwrap_or("unknown")
                    )
                })
                .unwrap_or(body);
            bail!("vertex returned {status}: {detail}");
        }

        let envelope: GenerateContentResponse =
            serde_json::from_str(&body).context("failed to decode generateContent response")?;
        into_raw_response(envelope)
    }
}

#[async_trait]
impl AnalyzerClient for VertexAnalyzerClient {
    async fn analyze(
        &self,
        object: &RemoteObjectRef,
        prompt: &str,
    ) -> Result<RawAnalyzerResponse, PipelineError> {
        if self.config.project_id.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "project id is not configured".to_string(),
            ));
        }

        info!(
            uri = object.uri(),
            model = %self.config.model,
            "vertex: requesting analysis"
        );

        let raw = self
            .generate(object, prompt)
            .await
            .map_err(PipelineError::Inference)?;

        if raw.finish_reason.as_deref().is_some_and(|r| r != "STOP") {
            warn!(finish_reason = ?raw.finish_reason, "vertex: generation did not stop cleanly");
        }
        Ok(raw)
    }
}

fn into_raw_response(envelope: GenerateContentResponse) -> Result<RawAnalyzerResponse> {
    if let Some(reason) = envelope.prompt_feedback.and_then(|f| f.block_reason) {
        bail!("prompt blocked: {reason}");
    }

    let candidate = envelope
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("response has no candidates"))?;

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(RawAnalyzerResponse {
        text,
        model_version: envelope.model_version,
        finish_reason: candidate.finish_reason,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}
