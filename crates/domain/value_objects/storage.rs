/// Reference to an artifact stored in the remote object store.
///
/// Only the uploader creates these, after a successful upload of a non-empty
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRef {
    bucket: String,
    key: String,
    uri: String,
    content_type: String,
}

impl RemoteObjectRef {
    pub(crate) fn new(bucket: String, key: String, uri: String, content_type: String) -> Self {
        Self {
            bucket,
            key,
            uri,
            content_type,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// e.g. `gs://bucket/video-uploads/<uuid>.mp4`
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Bucket, key prefix and URI scheme the uploader writes to.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    pub key_prefix: String,
    pub uri_scheme: String,
}
