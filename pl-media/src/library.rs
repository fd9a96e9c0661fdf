//! In-memory media library
//!
//! Files dropped by the visitor are kept in process memory, in insertion
//! order, until deleted or the process exits. Nothing is persisted.

use crate::error::{MediaError, Result};
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use pl_common::backend::FileUpload;
use pl_common::multipart::OCTET_STREAM;
use pl_common::{EventBus, Notice, PlEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const EMPTY_LIBRARY_MESSAGE: &str = "No files uploaded yet. Drop some files to get started!";

/// MIME type prefixes accepted by the drop zone
const ACCEPTED_PREFIXES: &[&str] = &["image/", "audio/", "video/"];
const ACCEPTED_TYPES: &[&str] = &["application/pdf"];

/// How an item is previewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    Image,
    Audio,
    /// Shown as a label with the MIME type
    Other,
}

impl PreviewKind {
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            PreviewKind::Image
        } else if mime_type.starts_with("audio/") {
            PreviewKind::Audio
        } else {
            PreviewKind::Other
        }
    }
}

/// Library entry as shown to the visitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFile {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    /// Where the content is served
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub size: usize,
    pub preview: PreviewKind,
}

/// File refused by the drop zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub mime_type: String,
}

/// Outcome of one drop
#[derive(Debug, Clone, Default, Serialize)]
pub struct DropReport {
    pub added: Vec<MediaFile>,
    pub rejected: Vec<RejectedFile>,
}

struct StoredMedia {
    file: MediaFile,
    bytes: Bytes,
}

pub struct MediaLibrary {
    items: RwLock<Vec<StoredMedia>>,
    bus: Arc<EventBus>,
}

impl MediaLibrary {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Add dropped files; unsupported types are reported, not stored
    pub async fn add_files(&self, files: Vec<FileUpload>) -> DropReport {
        let mut report = DropReport::default();
        let mut accepted = Vec::new();

        for upload in files {
            let mime_type = resolve_mime_type(&upload);
            if !is_accepted(&mime_type) {
                warn!(file = %upload.file_name, mime_type = %mime_type, "Rejected unsupported file");
                report.rejected.push(RejectedFile {
                    name: upload.file_name,
                    mime_type,
                });
                continue;
            }

            let id = Uuid::new_v4();
            let file = MediaFile {
                id,
                url: content_url(id),
                created_at: Utc::now(),
                size: upload.bytes.len(),
                preview: PreviewKind::for_mime(&mime_type),
                name: upload.file_name,
                mime_type,
            };
            debug!(id = %id, name = %file.name, "Added media file");
            report.added.push(file.clone());
            accepted.push(StoredMedia {
                file,
                bytes: upload.bytes,
            });
        }

        let count = {
            let mut items = self.items.write().await;
            items.extend(accepted);
            items.len()
        };

        if !report.added.is_empty() {
            info!("Added {} file(s) to the media library", report.added.len());
            self.bus.notify(Notice::info(
                "Files uploaded",
                format!("Successfully uploaded {} file(s)", report.added.len()),
            ));
            self.bus.emit_lossy(PlEvent::MediaLibraryChanged { count });
        }
        if !report.rejected.is_empty() {
            let names: Vec<&str> = report.rejected.iter().map(|r| r.name.as_str()).collect();
            self.bus.notify(Notice::error(format!(
                "Unsupported file type: {}",
                names.join(", ")
            )));
        }

        report
    }

    pub async fn list(&self) -> Vec<MediaFile> {
        self.items
            .read()
            .await
            .iter()
            .map(|item| item.file.clone())
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<MediaFile> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.file.id == id)
            .map(|item| item.file.clone())
            .ok_or(MediaError::NotFound(id))
    }

    /// MIME type and bytes of one item
    pub async fn content(&self, id: Uuid) -> Result<(String, Bytes)> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.file.id == id)
            .map(|item| (item.file.mime_type.clone(), item.bytes.clone()))
            .ok_or(MediaError::NotFound(id))
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<MediaFile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.report(MediaError::EmptyName));
        }

        let renamed = self
            .items
            .write()
            .await
            .iter_mut()
            .find(|item| item.file.id == id)
            .map(|item| {
                item.file.name = name.to_string();
                item.file.clone()
            });
        let Some(renamed) = renamed else {
            return Err(self.report(MediaError::NotFound(id)));
        };

        info!(id = %id, name = %renamed.name, "Renamed media file");
        self.bus.notify(Notice::info(
            "File renamed",
            "The file has been successfully renamed",
        ));
        Ok(renamed)
    }

    pub async fn delete(&self, id: Uuid) -> Result<MediaFile> {
        let (removed, count) = {
            let mut items = self.items.write().await;
            match items.iter().position(|item| item.file.id == id) {
                Some(index) => {
                    let removed = items.remove(index).file;
                    (removed, items.len())
                }
                None => return Err(self.report(MediaError::NotFound(id))),
            }
        };

        info!(id = %id, name = %removed.name, "Deleted media file");
        self.bus.notify(Notice::info(
            "File deleted",
            "The file has been successfully deleted",
        ));
        self.bus.emit_lossy(PlEvent::MediaLibraryChanged { count });
        Ok(removed)
    }

    fn report(&self, error: MediaError) -> MediaError {
        warn!(kind = error.kind(), "{}", error);
        self.bus.notify(error.notice());
        error
    }
}

/// Relative address the item content is served from
pub fn content_url(id: Uuid) -> String {
    format!("/api/media/{}/content", id)
}

pub fn is_accepted(mime_type: &str) -> bool {
    ACCEPTED_PREFIXES.iter().any(|p| mime_type.starts_with(p)) || ACCEPTED_TYPES.contains(&mime_type)
}

/// Declared type, else sniffed from content, else guessed from the extension
pub fn resolve_mime_type(file: &FileUpload) -> String {
    let declared = file.content_type.trim();
    if !declared.is_empty() && declared != OCTET_STREAM {
        return declared.to_ascii_lowercase();
    }

    if let Some(kind) = infer::get(&file.bytes) {
        return kind.mime_type().to_string();
    }

    file.extension()
        .and_then(mime_from_extension)
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> MediaLibrary {
        MediaLibrary::new(Arc::new(EventBus::new(16)))
    }

    #[test]
    fn test_accept_filter() {
        assert!(is_accepted("image/png"));
        assert!(is_accepted("audio/mpeg"));
        assert!(is_accepted("video/mp4"));
        assert!(is_accepted("application/pdf"));
        assert!(!is_accepted("application/zip"));
        assert!(!is_accepted("text/plain"));
    }

    #[test]
    fn test_resolve_mime_type_order() {
        let declared = FileUpload::new("x.bin", "Image/PNG", b"anything".to_vec());
        assert_eq!(resolve_mime_type(&declared), "image/png");

        // PNG signature without a declared type
        let sniffed = FileUpload::new(
            "noext",
            OCTET_STREAM,
            vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0],
        );
        assert_eq!(resolve_mime_type(&sniffed), "image/png");

        let guessed = FileUpload::new("report.PDF", "", b"not really a pdf".to_vec());
        assert_eq!(resolve_mime_type(&guessed), "application/pdf");

        let unknown = FileUpload::new("notes", "", b"plain words".to_vec());
        assert_eq!(resolve_mime_type(&unknown), OCTET_STREAM);
    }

    #[test]
    fn test_preview_kind() {
        assert_eq!(PreviewKind::for_mime("image/gif"), PreviewKind::Image);
        assert_eq!(PreviewKind::for_mime("audio/ogg"), PreviewKind::Audio);
        assert_eq!(PreviewKind::for_mime("video/mp4"), PreviewKind::Other);
        assert_eq!(PreviewKind::for_mime("application/pdf"), PreviewKind::Other);
    }

    #[tokio::test]
    async fn test_add_keeps_order_and_rejects_unsupported() {
        let library = library();
        let mut rx = library.event_bus().subscribe();

        let report = library
            .add_files(vec![
                FileUpload::new("a.png", "image/png", b"a".to_vec()),
                FileUpload::new("b.zip", "application/zip", b"b".to_vec()),
                FileUpload::new("c.mp3", "audio/mpeg", b"cc".to_vec()),
            ])
            .await;

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "b.zip");

        let names: Vec<_> = library.list().await.into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a.png", "c.mp3"]);

        match rx.recv().await.unwrap() {
            PlEvent::Notice { notice } => {
                assert_eq!(notice.title, "Files uploaded");
                assert_eq!(notice.description, "Successfully uploaded 2 file(s)");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), PlEvent::MediaLibraryChanged { count: 2 });
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let library = library();
        let report = library
            .add_files(vec![FileUpload::new("a.png", "image/png", b"a".to_vec())])
            .await;
        let id = report.added[0].id;

        assert!(matches!(library.rename(id, "  ").await, Err(MediaError::EmptyName)));
        let renamed = library.rename(id, " holiday.png ").await.unwrap();
        assert_eq!(renamed.name, "holiday.png");
        assert_eq!(library.get(id).await.unwrap().name, "holiday.png");

        let (mime_type, bytes) = library.content(id).await.unwrap();
        assert_eq!(mime_type, "image/png");
        assert_eq!(&bytes[..], b"a");

        library.delete(id).await.unwrap();
        assert!(library.list().await.is_empty());
        assert!(matches!(library.delete(id).await, Err(MediaError::NotFound(_))));
        assert!(matches!(
            library.rename(id, "x").await,
            Err(MediaError::NotFound(_))
        ));
    }
}
