//! Asset uploader
//!
//! Resolves chosen files to durable public addresses. Every upload gets a
//! fresh random object path, so nothing already stored is overwritten.

use futures::future::join_all;
use pl_common::backend::{FileUpload, ObjectStore};
use pl_common::{Error, ImageRef, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Image batch in which at least one upload failed
#[derive(Debug)]
pub struct BatchFailure {
    /// First failure, in selection order
    pub error: Error,
    /// Uploads that did complete, in selection order
    pub uploaded: Vec<ImageRef>,
}

pub struct AssetUploader {
    objects: Arc<dyn ObjectStore>,
    images_bucket: String,
    audio_bucket: String,
}

impl AssetUploader {
    pub fn new(objects: Arc<dyn ObjectStore>, images_bucket: &str, audio_bucket: &str) -> Self {
        Self {
            objects,
            images_bucket: images_bucket.to_string(),
            audio_bucket: audio_bucket.to_string(),
        }
    }

    /// Upload one file into `bucket`; returns its public address
    pub async fn upload(&self, bucket: &str, file: &FileUpload) -> Result<String> {
        let path = file.object_path();
        self.objects
            .upload(bucket, &path, &file.content_type, file.bytes.clone())
            .await?;

        let url = self.objects.public_url(bucket, &path);
        debug!(file = %file.file_name, url = %url, "Uploaded asset");
        Ok(url)
    }

    /// Upload images concurrently
    ///
    /// The returned addresses follow the order of `files`, whatever order the
    /// uploads complete in. Every upload runs to completion, so on failure
    /// the caller still learns which objects were stored.
    pub async fn upload_images(&self, files: &[FileUpload]) -> std::result::Result<Vec<ImageRef>, BatchFailure> {
        let results = join_all(files.iter().map(|file| self.upload(&self.images_bucket, file))).await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(url) => uploaded.push(ImageRef::new(url)),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!(file = %file.file_name, error = %e, "Image upload failed"),
            }
        }

        match first_error {
            None => Ok(uploaded),
            Some(error) => Err(BatchFailure { error, uploaded }),
        }
    }

    pub async fn upload_audio(&self, file: &FileUpload) -> Result<String> {
        self.upload(&self.audio_bucket, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use pl_common::backend::local::LocalObjectStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Local store that rejects its n-th upload (1-based)
    struct RejectNth {
        inner: LocalObjectStore,
        calls: AtomicUsize,
        reject: usize,
    }

    #[async_trait]
    impl ObjectStore for RejectNth {
        async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Bytes) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.reject {
                return Err(Error::Network("boom".to_string()));
            }
            self.inner.upload(bucket, path, content_type, bytes).await
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            self.inner.public_url(bucket, path)
        }
    }

    #[tokio::test]
    async fn test_images_keep_selection_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:5780"));
        let uploader = AssetUploader::new(store, "partner-images", "partner-audio");

        let files = vec![
            FileUpload::new("first.png", "image/png", b"1".to_vec()),
            FileUpload::new("second.jpg", "image/jpeg", b"22".to_vec()),
            FileUpload::new("third.gif", "image/gif", b"333".to_vec()),
        ];
        let images = uploader.upload_images(&files).await.unwrap();

        assert_eq!(images.len(), 3);
        for (image, ext) in images.iter().zip(["png", "jpg", "gif"]) {
            assert!(image.url.starts_with("http://localhost:5780/storage/partner-images/"));
            assert!(image.url.ends_with(ext));
        }

        // Content follows the same order as the addresses
        for (image, file) in images.iter().zip(&files) {
            let name = image.url.rsplit('/').next().unwrap();
            let stored = std::fs::read(dir.path().join("partner-images").join(name)).unwrap();
            assert_eq!(stored, file.bytes.to_vec());
        }
    }

    #[tokio::test]
    async fn test_audio_goes_to_audio_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost"));
        let uploader = AssetUploader::new(store, "imgs", "voices");

        let url = uploader
            .upload_audio(&FileUpload::new("memo.m4a", "audio/mp4", b"aac".to_vec()))
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost/storage/voices/"));
        assert!(url.ends_with(".m4a"));
    }

    #[tokio::test]
    async fn test_failed_batch_reports_completed_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RejectNth {
            inner: LocalObjectStore::new(dir.path(), "http://localhost"),
            calls: AtomicUsize::new(0),
            reject: 2,
        });
        let uploader = AssetUploader::new(store.clone(), "imgs", "voices");

        let files = vec![
            FileUpload::new("first.png", "image/png", b"1".to_vec()),
            FileUpload::new("second.jpg", "image/jpeg", b"2".to_vec()),
            FileUpload::new("third.gif", "image/gif", b"3".to_vec()),
        ];
        let failure = uploader.upload_images(&files).await.unwrap_err();

        // Siblings of the failed upload still ran
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(failure.error, Error::Network(_)));
        assert_eq!(failure.uploaded.len(), 2);
        assert!(failure.uploaded[0].url.ends_with(".png"));
        assert!(failure.uploaded[1].url.ends_with(".gif"));

        let stored = std::fs::read_dir(dir.path().join("imgs")).unwrap().count();
        assert_eq!(stored, 2);
    }
}
