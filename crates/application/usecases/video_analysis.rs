use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::application::{result_normalizer, stream_selector, uploader::Uploader};
use crate::domain::{
    errors::PipelineError,
    repositories::{
        analyzer::AnalyzerClient, fetcher::StreamFetcher, storage::ObjectStorage,
        video_catalog::VideoCatalog,
    },
    value_objects::{
        analysis::{AnalysisResult, ResultSchema},
        streams::SelectionPolicy,
    },
};

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub selection: SelectionPolicy,
    pub scratch_dir: PathBuf,
    pub prompt: String,
    pub schema: ResultSchema,
    /// Keep the uploaded object after analysis instead of deleting it.
    pub retain_uploads: bool,
}

/// Download → upload → analyze → normalize, one stage after another.
pub struct VideoAnalysisUseCase<C, F, S, A>
where
    C: VideoCatalog + ?Sized,
    F: StreamFetcher + ?Sized,
    S: ObjectStorage + ?Sized,
    A: AnalyzerClient + ?Sized,
{
    catalog: Arc<C>,
    fetcher: Arc<F>,
    uploader: Uploader<S>,
    analyzer: Arc<A>,
    settings: AnalysisSettings,
}

impl<C, F, S, A> VideoAnalysisUseCase<C, F, S, A>
where
    C: VideoCatalog + ?Sized,
    F: StreamFetcher + ?Sized,
    S: ObjectStorage + ?Sized + 'static,
    A: AnalyzerClient + ?Sized,
{
    pub fn new(
        catalog: Arc<C>,
        fetcher: Arc<F>,
        uploader: Uploader<S>,
        analyzer: Arc<A>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            uploader,
            analyzer,
            settings,
        }
    }

    pub async fn analyze_video(&self, video_url: &str) -> Result<AnalysisResult, PipelineError> {
        info!(%video_url, "video_analysis: starting");

        // Nothing is downloaded for a run that could never be uploaded.
        self.uploader
            .ensure_configured()
            .map_err(|err| log_stage_failure(video_url, "check upload target", err))?;

        let streams = self
            .catalog
            .list_streams(video_url)
            .await
            .map_err(|err| log_stage_failure(video_url, "list streams", err))?;

        let descriptor = stream_selector::select(&streams, &self.settings.selection)
            .map_err(|err| log_stage_failure(video_url, "select stream", err))?;

        info!(
            %video_url,
            format_id = %descriptor.format_id,
            resolution = ?descriptor.resolution,
            progressive = descriptor.is_progressive,
            container = %descriptor.container_format,
            "video_analysis: stream selected"
        );

        let artifact = self
            .fetcher
            .fetch(descriptor, &self.settings.scratch_dir)
            .await
            .map_err(|err| log_stage_failure(video_url, "fetch stream", err))?;

        info!(
            %video_url,
            path = %artifact.local_path().display(),
            size_bytes = artifact.byte_size(),
            content_type = %artifact.content_type(),
            "video_analysis: download complete"
        );

        let object = self
            .uploader
            .upload(&artifact)
            .await
            .map_err(|err| log_stage_failure(video_url, "upload", err))?;

        // The local copy is no longer needed once the object store has it.
        drop(artifact);

        // Dropped with the run if it is cancelled while the model is working.
        let guard = self.uploader.guard(object.clone());

        let response = self.analyzer.analyze(&object, &self.settings.prompt).await;

        if self.settings.retain_uploads {
            guard.retain();
        } else {
            guard.discard().await;
        }

        let raw = response.map_err(|err| log_stage_failure(video_url, "analyze", err))?;

        let result = result_normalizer::normalize(&raw, &self.settings.schema);
        info!(
            %video_url,
            is_valid = result.is_valid,
            error = ?result.error,
            "video_analysis: finished"
        );

        Ok(result)
    }
}

fn log_stage_failure(video_url: &str, stage: &str, err: PipelineError) -> PipelineError {
    error!(
        %video_url,
        stage,
        kind = %err.kind(),
        error = %err,
        "video_analysis: stage failed"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        errors::ErrorKind,
        repositories::{
            analyzer::MockAnalyzerClient, fetcher::MockStreamFetcher,
            storage::MockObjectStorage, video_catalog::MockVideoCatalog,
        },
        value_objects::{
            analysis::RawAnalyzerResponse,
            artifacts::FetchedArtifact,
            storage::{RemoteObjectRef, UploadTarget},
            streams::{Resolution, SourceHandle, StreamDescriptor},
        },
    };
    use mockall::predicate::eq;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    fn catalog_of(streams: Vec<StreamDescriptor>) -> MockVideoCatalog {
        let mut catalog = MockVideoCatalog::new();
        catalog
            .expect_list_streams()
            .with(eq("https://video.example/watch?v=abc"))
            .returning(move |_| Ok(streams.clone()));
        catalog
    }

    fn progressive(id: &str, height: u32) -> StreamDescriptor {
        StreamDescriptor {
            format_id: id.to_string(),
            resolution: Some(Resolution(height)),
            is_progressive: true,
            container_format: "mp4".to_string(),
            source_handle: SourceHandle::new(format!("https://media.example/{id}")),
        }
    }

    /// Writes a real scratch file so the artifact can be adopted, and records
    /// its path so the test can check it was cleaned up.
    fn writing_fetcher(written: Arc<Mutex<Vec<PathBuf>>>) -> MockStreamFetcher {
        let mut fetcher = MockStreamFetcher::new();
        fetcher.expect_fetch().times(1).returning(move |descriptor, dir| {
            let path = dir.join(format!("{}.mp4", descriptor.format_id));
            std::fs::write(&path, b"video-bytes").unwrap();
            written.lock().unwrap().push(path.clone());
            let handle = tokio::runtime::Handle::current();
            let artifact = tokio::task::block_in_place(|| {
                handle.block_on(FetchedArtifact::adopt(path, "video/mp4"))
            })
            .unwrap();
            Ok(artifact)
        });
        fetcher
    }

    fn settings(scratch_dir: &Path, retain_uploads: bool) -> AnalysisSettings {
        AnalysisSettings {
            selection: SelectionPolicy::default(),
            scratch_dir: scratch_dir.to_path_buf(),
            prompt: "describe the video".to_string(),
            schema: ResultSchema::new()
                .required("summary")
                .optional("tags")
                .with_default("tags", json!([])),
            retain_uploads,
        }
    }

    fn target() -> UploadTarget {
        UploadTarget {
            bucket: "analysis-bucket".to_string(),
            key_prefix: "video-uploads".to_string(),
            uri_scheme: "gs".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_every_stage_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));

        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .times(1)
            .returning(|_, _, path, _| {
                assert!(path.exists());
                Ok(())
            });
        storage
            .expect_delete_object()
            .withf(|bucket, key| bucket == "analysis-bucket" && key.starts_with("video-uploads/"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut analyzer = MockAnalyzerClient::new();
        analyzer
            .expect_analyze()
            .withf(|object, prompt| {
                object.uri().starts_with("gs://analysis-bucket/video-uploads/")
                    && prompt == "describe the video"
            })
            .times(1)
            .returning(|_, _| Ok(RawAnalyzerResponse::from_text(r#"{"summary": "x"}"#)));

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(vec![progressive("18", 360), progressive("22", 720)])),
            Arc::new(writing_fetcher(Arc::clone(&written))),
            Uploader::new(Arc::new(storage), &target()),
            Arc::new(analyzer),
            settings(dir.path(), false),
        );

        let result = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap();

        assert!(result.is_valid);
        assert_eq!(result.fields.get("summary"), Some(&json!("x")));
        assert_eq!(result.fields.get("tags"), Some(&json!([])));

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("22.mp4"));
        assert!(!written[0].exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retained_uploads_are_not_deleted() {
        let dir = tempfile::tempdir().unwrap();

        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().returning(|_, _, _, _| Ok(()));
        storage.expect_delete_object().never();

        let mut analyzer = MockAnalyzerClient::new();
        analyzer
            .expect_analyze()
            .returning(|_, _| Ok(RawAnalyzerResponse::from_text(r#"{"summary": "x"}"#)));

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(vec![progressive("22", 720)])),
            Arc::new(writing_fetcher(Arc::new(Mutex::new(Vec::new())))),
            Uploader::new(Arc::new(storage), &target()),
            Arc::new(analyzer),
            settings(dir.path(), true),
        );

        let result = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap();
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn empty_catalog_stops_before_download() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockStreamFetcher::new();
        fetcher.expect_fetch().never();
        let mut analyzer = MockAnalyzerClient::new();
        analyzer.expect_analyze().never();

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(Vec::new())),
            Arc::new(fetcher),
            Uploader::new(Arc::new(MockObjectStorage::new()), &target()),
            Arc::new(analyzer),
            settings(dir.path(), false),
        );

        let err = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoStreamAvailable);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inference_failure_still_discards_upload_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));

        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().returning(|_, _, _, _| Ok(()));
        storage
            .expect_delete_object()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut analyzer = MockAnalyzerClient::new();
        analyzer.expect_analyze().returning(|_, _| {
            Err(PipelineError::Inference(anyhow::anyhow!(
                "Vertex AI returned 503"
            )))
        });

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(vec![progressive("22", 720)])),
            Arc::new(writing_fetcher(Arc::clone(&written))),
            Uploader::new(Arc::new(storage), &target()),
            Arc::new(analyzer),
            settings(dir.path(), false),
        );

        let err = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceError);
        assert!(!written.lock().unwrap()[0].exists());
    }

    #[tokio::test]
    async fn missing_bucket_fails_before_listing_or_downloading() {
        let dir = tempfile::tempdir().unwrap();

        let mut catalog = MockVideoCatalog::new();
        catalog.expect_list_streams().never();
        let mut fetcher = MockStreamFetcher::new();
        fetcher.expect_fetch().never();
        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().never();
        let mut analyzer = MockAnalyzerClient::new();
        analyzer.expect_analyze().never();

        let mut target = target();
        target.bucket = String::new();

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog),
            Arc::new(fetcher),
            Uploader::new(Arc::new(storage), &target),
            Arc::new(analyzer),
            settings(dir.path(), false),
        );

        let err = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    /// Stands in for a model call that never completes.
    struct StalledAnalyzer;

    #[async_trait::async_trait]
    impl AnalyzerClient for StalledAnalyzer {
        async fn analyze(
            &self,
            _object: &RemoteObjectRef,
            _prompt: &str,
        ) -> Result<RawAnalyzerResponse, PipelineError> {
            std::future::pending().await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_run_still_deletes_upload_and_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().times(1).returning(|_, _, _, _| Ok(()));
        storage
            .expect_delete_object()
            .times(1)
            .returning(move |_, key| {
                tx.send(key.to_string()).unwrap();
                Ok(())
            });

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(vec![progressive("22", 720)])),
            Arc::new(writing_fetcher(Arc::clone(&written))),
            Uploader::new(Arc::new(storage), &target()),
            Arc::new(StalledAnalyzer),
            settings(dir.path(), false),
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            usecase.analyze_video("https://video.example/watch?v=abc"),
        )
        .await;
        assert!(outcome.is_err(), "run should still be waiting on the model");

        let deleted = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(deleted.starts_with("video-uploads/"));
        assert!(!written.lock().unwrap()[0].exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_model_output_is_reported_in_result() {
        let dir = tempfile::tempdir().unwrap();

        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().returning(|_, _, _, _| Ok(()));
        storage.expect_delete_object().returning(|_, _| Ok(()));

        let mut analyzer = MockAnalyzerClient::new();
        analyzer
            .expect_analyze()
            .returning(|_, _| Ok(RawAnalyzerResponse::from_text("not json")));

        let usecase = VideoAnalysisUseCase::new(
            Arc::new(catalog_of(vec![progressive("22", 720)])),
            Arc::new(writing_fetcher(Arc::new(Mutex::new(Vec::new())))),
            Uploader::new(Arc::new(storage), &target()),
            Arc::new(analyzer),
            settings(dir.path(), false),
        );

        let result = usecase
            .analyze_video("https://video.example/watch?v=abc")
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.error, Some(ErrorKind::MalformedResponse));
    }
}
