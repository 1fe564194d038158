use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::{ProvideErrorMetadata, SdkError},
    operation::delete_object::DeleteObjectError,
    operation::put_object::PutObjectError,
    primitives::ByteStream,
};
use tracing::debug;

use crate::domain::repositories::storage::ObjectStorage;

use super::s3::{S3Config, build_s3_client};

pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStorage {
    pub async fn new(config: &S3Config) -> Result<Self> {
        let client = build_s3_client(config)
            .await
            .context("failed to build object storage s3 client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("failed to open upload source {}", local_path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| map_put_object_error(err, bucket, key))?;

        debug!(bucket, key, "object_storage: put_object completed");
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_delete_object_error(err, bucket, key))?;

        debug!(bucket, key, "object_storage: delete_object completed");
        Ok(())
    }
}

fn map_put_object_error(err: SdkError<PutObjectError>, bucket: &str, key: &str) -> anyhow::Error {
    if let SdkError::ServiceError(service_err) = &err {
        let raw = service_err.raw();
        return service_error_detail(
            "failed to upload object",
            raw.status().as_u16(),
            service_err.err().code(),
            service_err.err().message(),
            raw.body().bytes(),
            bucket,
            key,
        );
    }

    anyhow::Error::new(err).context(format!(
        "failed to upload object [bucket={}, key={}]",
        bucket, key
    ))
}

fn map_delete_object_error(
    err: SdkError<DeleteObjectError>,
    bucket: &str,
    key: &str,
) -> anyhow::Error {
    if let SdkError::ServiceError(service_err) = &err {
        let raw = service_err.raw();
        return service_error_detail(
            "failed to delete object",
            raw.status().as_u16(),
            service_err.err().code(),
            service_err.err().message(),
            raw.body().bytes(),
            bucket,
            key,
        );
    }

    anyhow::Error::new(err).context(format!(
        "failed to delete object [bucket={}, key={}]",
        bucket, key
    ))
}

fn service_error_detail(
    action: &str,
    status: u16,
    code: Option<&str>,
    message: Option<&str>,
    body: Option<&[u8]>,
    bucket: &str,
    key: &str,
) -> anyhow::Error {
    let mut detail = format!(
        "{} (status {}, code {})",
        action,
        status,
        code.unwrap_or("unknown")
    );

    if let Some(message) = message.filter(|m| !m.is_empty()) {
        detail.push_str(&format!(": {}", message));
    }

    detail.push_str(&format!(" [bucket={}, key={}]", bucket, key));

    let body = body
        .map(|b| String::from_utf8_lossy(b).trim().to_owned())
        .unwrap_or_default();
    if !body.is_empty() {
        // Keep a short preview of the response body for debugging.
        let preview = body.chars().take(512).collect::<String>();
        detail.push_str(&format!("; body={}", preview));
    }

    anyhow::anyhow!(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_detail_includes_status_code_and_target() {
        let err = service_error_detail(
            "failed to upload object",
            403,
            Some("AccessDenied"),
            Some("Access denied."),
            Some(b"  <Error><Code>AccessDenied</Code></Error>  ".as_slice()),
            "analysis-bucket",
            "video-uploads/a.mp4",
        );
        assert_eq!(
            err.to_string(),
            "failed to upload object (status 403, code AccessDenied): Access denied. \
             [bucket=analysis-bucket, key=video-uploads/a.mp4]; \
             body=<Error><Code>AccessDenied</Code></Error>"
        );
    }

    #[test]
    fn service_error_detail_without_metadata() {
        let err = service_error_detail("failed to delete object", 500, None, None, None, "b", "k");
        assert_eq!(
            err.to_string(),
            "failed to delete object (status 500, code unknown) [bucket=b, key=k]"
        );
    }

    // Manual check against a real bucket:
    // export STORAGE_S3_* and GCS_BUCKET_NAME, then run
    // cargo test -p crates object_storage::tests::put_and_delete_roundtrip -- --ignored --nocapture
    #[tokio::test]
    #[ignore = "hits a real object store and needs credentials"]
    async fn put_and_delete_roundtrip() -> Result<()> {
        let config = S3Config::new(
            std::env::var("STORAGE_S3_ENDPOINT")
                .unwrap_or_else(|_| "https://storage.googleapis.com".to_string()),
            std::env::var("STORAGE_S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            std::env::var("STORAGE_S3_ACCESS_KEY_ID").context("STORAGE_S3_ACCESS_KEY_ID")?,
            std::env::var("STORAGE_S3_SECRET_ACCESS_KEY")
                .context("STORAGE_S3_SECRET_ACCESS_KEY")?,
        );
        let bucket = std::env::var("GCS_BUCKET_NAME").context("GCS_BUCKET_NAME")?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("probe.txt");
        tokio::fs::write(&path, b"probe").await?;

        let storage = S3ObjectStorage::new(&config).await?;
        let key = format!("video-uploads/probe-{}.txt", uuid::Uuid::new_v4());
        storage.put_object(&bucket, &key, &path, "text/plain").await?;
        storage.delete_object(&bucket, &key).await?;
        Ok(())
    }
}
