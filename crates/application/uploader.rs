use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    errors::PipelineError,
    repositories::storage::ObjectStorage,
    value_objects::{
        artifacts::FetchedArtifact,
        storage::{RemoteObjectRef, UploadTarget},
    },
};

/// Pushes fetched artifacts to the configured bucket under fresh keys.
pub struct Uploader<S>
where
    S: ObjectStorage + ?Sized,
{
    storage: Arc<S>,
    bucket: String,
    key_prefix: String,
    uri_scheme: String,
}

impl<S> Clone for Uploader<S>
where
    S: ObjectStorage + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            bucket: self.bucket.clone(),
            key_prefix: self.key_prefix.clone(),
            uri_scheme: self.uri_scheme.clone(),
        }
    }
}

impl<S> Uploader<S>
where
    S: ObjectStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, target: &UploadTarget) -> Self {
        let uri_scheme = target.uri_scheme.trim().trim_end_matches("://");
        Self {
            storage,
            bucket: target.bucket.trim().to_string(),
            key_prefix: normalize_prefix(&target.key_prefix),
            uri_scheme: if uri_scheme.is_empty() {
                "gs".to_string()
            } else {
                uri_scheme.to_string()
            },
        }
    }

    /// Fails when no bucket is configured. No transport call is made.
    pub fn ensure_configured(&self) -> Result<(), PipelineError> {
        if self.bucket.is_empty() {
            error!("uploader: target bucket is not configured");
            return Err(PipelineError::Configuration(
                "object storage bucket name is not set".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn upload(&self, artifact: &FetchedArtifact) -> Result<RemoteObjectRef, PipelineError> {
        self.ensure_configured()?;

        let key = derive_object_key(&self.key_prefix, artifact.content_type());

        info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = artifact.byte_size(),
            "uploader: starting upload"
        );

        self.storage
            .put_object(
                &self.bucket,
                &key,
                artifact.local_path(),
                artifact.content_type(),
            )
            .await
            .map_err(|err| {
                error!(
                    bucket = %self.bucket,
                    key = %key,
                    error = %err,
                    "uploader: upload failed"
                );
                PipelineError::Upload(err)
            })?;

        let uri = format!("{}://{}/{}", self.uri_scheme, self.bucket, key);
        info!(uri = %uri, "uploader: upload completed");

        Ok(RemoteObjectRef::new(
            self.bucket.clone(),
            key,
            uri,
            artifact.content_type().to_string(),
        ))
    }

    /// Removes an uploaded object. Failures are logged, never returned.
    pub async fn discard(&self, object: &RemoteObjectRef) {
        match self
            .storage
            .delete_object(object.bucket(), object.key())
            .await
        {
            Ok(()) => info!(uri = %object.uri(), "uploader: removed uploaded object"),
            Err(err) => warn!(
                uri = %object.uri(),
                error = %err,
                "uploader: failed to remove uploaded object"
            ),
        }
    }
}

impl<S> Uploader<S>
where
    S: ObjectStorage + ?Sized + 'static,
{
    /// Arms a guard that deletes `object` unless it is discarded or retained
    /// explicitly first.
    pub fn guard(&self, object: RemoteObjectRef) -> UploadGuard<S> {
        UploadGuard {
            uploader: self.clone(),
            object: Some(object),
        }
    }
}

/// Owns the cleanup of one uploaded object.
///
/// Dropping an armed guard (a cancelled run, a timed-out request) spawns the
/// delete on the current runtime.
pub struct UploadGuard<S>
where
    S: ObjectStorage + ?Sized + 'static,
{
    uploader: Uploader<S>,
    object: Option<RemoteObjectRef>,
}

impl<S> UploadGuard<S>
where
    S: ObjectStorage + ?Sized + 'static,
{
    pub async fn discard(mut self) {
        if let Some(object) = &self.object {
            self.uploader.discard(object).await;
        }
        self.object = None;
    }

    /// Keeps the object in the bucket.
    pub fn retain(mut self) {
        self.object = None;
    }
}

impl<S> Drop for UploadGuard<S>
where
    S: ObjectStorage + ?Sized + 'static,
{
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(uri = %object.uri(), "uploader: run abandoned, removing uploaded object");
                let uploader = self.uploader.clone();
                handle.spawn(async move {
                    uploader.discard(&object).await;
                });
            }
            Err(_) => warn!(
                uri = %object.uri(),
                "uploader: no runtime to remove abandoned object"
            ),
        }
    }
}

/// `<prefix>/<uuid>.<ext>`, or `<uuid>.<ext>` without a prefix.
pub fn derive_object_key(key_prefix: &str, content_type: &str) -> String {
    let name = format!("{}.{}", Uuid::new_v4(), extension_from(content_type));
    let prefix = key_prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub fn extension_from(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "video/3gpp" => "3gp",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/webm" => "weba",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|extensions| extensions.first().copied())
            .unwrap_or("bin"),
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::storage::MockObjectStorage;
    use mockall::predicate::{always, eq};
    use std::path::Path;

    fn target(bucket: &str) -> UploadTarget {
        UploadTarget {
            bucket: bucket.to_string(),
            key_prefix: "/video-uploads/".to_string(),
            uri_scheme: "gs".to_string(),
        }
    }

    async fn artifact_in(dir: &Path) -> FetchedArtifact {
        let path = dir.join("clip.mp4");
        tokio::fs::write(&path, b"frames").await.unwrap();
        FetchedArtifact::adopt(path, "video/mp4").await.unwrap()
    }

    #[tokio::test]
    async fn empty_bucket_fails_before_any_transport_call() {
        let mut storage = MockObjectStorage::new();
        storage.expect_put_object().never();
        let storage = Arc::new(storage);

        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path()).await;

        for bucket in ["", "   "] {
            let uploader = Uploader::new(Arc::clone(&storage), &target(bucket));
            let err = uploader.upload(&artifact).await.unwrap_err();
            assert!(matches!(err, PipelineError::Configuration(_)));
        }
    }

    #[tokio::test]
    async fn uploads_under_prefixed_unique_key() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path()).await;
        let expected_path = artifact.local_path().to_path_buf();

        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .with(eq("analysis-bucket"), always(), eq(expected_path), eq("video/mp4"))
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let uploader = Uploader::new(Arc::new(storage), &target("analysis-bucket"));
        let first = uploader.upload(&artifact).await.unwrap();
        let second = uploader.upload(&artifact).await.unwrap();

        assert_eq!(first.bucket(), "analysis-bucket");
        assert!(first.key().starts_with("video-uploads/"));
        assert!(first.key().ends_with(".mp4"));
        assert_eq!(
            first.uri(),
            format!("gs://analysis-bucket/{}", first.key())
        );
        assert_eq!(first.content_type(), "video/mp4");
        assert_ne!(first.key(), second.key());
    }

    #[tokio::test]
    async fn transport_failure_is_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path()).await;

        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("connection refused")));

        let uploader = Uploader::new(Arc::new(storage), &target("analysis-bucket"));
        let err = uploader.upload(&artifact).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));
    }

    #[tokio::test]
    async fn discard_swallows_delete_failures() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_delete_object()
            .with(eq("analysis-bucket"), eq("video-uploads/a.mp4"))
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("forbidden")));

        let uploader = Uploader::new(Arc::new(storage), &target("analysis-bucket"));
        let object = RemoteObjectRef::new(
            "analysis-bucket".to_string(),
            "video-uploads/a.mp4".to_string(),
            "gs://analysis-bucket/video-uploads/a.mp4".to_string(),
            "video/mp4".to_string(),
        );
        uploader.discard(&object).await;
    }

    fn uploaded(key: &str) -> RemoteObjectRef {
        RemoteObjectRef::new(
            "analysis-bucket".to_string(),
            key.to_string(),
            format!("gs://analysis-bucket/{key}"),
            "video/mp4".to_string(),
        )
    }

    #[tokio::test]
    async fn dropped_guard_deletes_object_in_background() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut storage = MockObjectStorage::new();
        storage
            .expect_delete_object()
            .with(eq("analysis-bucket"), eq("video-uploads/b.mp4"))
            .times(1)
            .returning(move |_, key| {
                tx.send(key.to_string()).unwrap();
                Ok(())
            });

        let uploader = Uploader::new(Arc::new(storage), &target("analysis-bucket"));
        drop(uploader.guard(uploaded("video-uploads/b.mp4")));

        let deleted = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(deleted.as_deref(), Some("video-uploads/b.mp4"));
    }

    #[tokio::test]
    async fn retained_or_discarded_guard_deletes_at_most_once() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_delete_object()
            .with(eq("analysis-bucket"), eq("video-uploads/c.mp4"))
            .times(1)
            .returning(|_, _| Ok(()));

        let uploader = Uploader::new(Arc::new(storage), &target("analysis-bucket"));
        uploader.guard(uploaded("video-uploads/keep.mp4")).retain();
        uploader.guard(uploaded("video-uploads/c.mp4")).discard().await;
        tokio::task::yield_now().await;
    }

    #[test]
    fn ensure_configured_rejects_blank_bucket() {
        let uploader = Uploader::new(Arc::new(MockObjectStorage::new()), &target("  "));
        assert!(matches!(
            uploader.ensure_configured(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn key_without_prefix_has_no_leading_slash() {
        let key = derive_object_key("", "video/webm");
        assert!(!key.starts_with('/'));
        assert!(key.ends_with(".webm"));
    }

    #[test]
    fn extension_from_content_type() {
        assert_eq!(extension_from("video/mp4"), "mp4");
        assert_eq!(extension_from("Video/MP4; codecs=\"avc1\""), "mp4");
        assert_eq!(extension_from("application/x-unknown-thing"), "bin");
    }
}
