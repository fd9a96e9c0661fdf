//! Partner form reconciler
//!
//! The [`EditBuffer`] is the working copy of one partner while the form is
//! open: text fields, the snapshot of already-uploaded images (reorderable),
//! and the files chosen in this session. [`FormReconciler::submit`] turns it
//! into exactly one row write:
//!
//! 1. validate (no network before this passes)
//! 2. upload new images concurrently, addresses kept in selection order
//!    (a failed batch still waits for its siblings so their objects are known)
//! 3. upload new audio, if any; it replaces the previous address
//! 4. images = snapshot followed by new addresses
//! 5. insert (new) or update by id (edit), owner stamped from the caller
//!
//! Uploaded objects are not removed when a later step fails; their
//! addresses are logged as orphans instead.

use crate::error::{AppError, Result};
use crate::images;
use crate::uploader::AssetUploader;
use pl_common::backend::{FileUpload, Filter, RowStore, User};
use pl_common::partner::{columns, PartnerWrite};
use pl_common::{ImageRef, PartnerRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// MIME prefix accepted by the image selector
pub const IMAGE_MIME_PREFIX: &str = "image/";

/// MIME prefix accepted by the audio selector
pub const AUDIO_MIME_PREFIX: &str = "audio/";

/// Working copy of a partner while the form is open
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    /// Record being edited; None for a new record
    pub partner_id: Option<i64>,
    pub name: String,
    /// Age as typed; parsed on submit
    pub age: String,
    pub location: String,
    pub notes: String,
    /// Existing images as of opening, in their current (possibly reordered) order
    pub images: Vec<ImageRef>,
    /// Existing audio address
    pub audio_url: Option<String>,
    /// Images chosen in this session, in selection order
    pub new_images: Vec<FileUpload>,
    /// Audio chosen in this session
    pub new_audio: Option<FileUpload>,
}

/// Partial update of the text fields; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldChanges {
    pub name: Option<String>,
    pub age: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Validated text fields, ready to write
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFields {
    pub name: String,
    pub age: Option<u32>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl EditBuffer {
    /// Empty buffer for a new record
    pub fn new_record() -> Self {
        Self {
            partner_id: None,
            name: String::new(),
            age: String::new(),
            location: String::new(),
            notes: String::new(),
            images: Vec::new(),
            audio_url: None,
            new_images: Vec::new(),
            new_audio: None,
        }
    }

    /// Buffer seeded from an existing record; nothing pending
    pub fn from_record(record: &PartnerRecord) -> Self {
        Self {
            partner_id: Some(record.id),
            name: record.name.clone(),
            age: record.age.map(|a| a.to_string()).unwrap_or_default(),
            location: record.location.clone().unwrap_or_default(),
            notes: record.notes.clone().unwrap_or_default(),
            images: record.images.clone(),
            audio_url: record.audio_url.clone(),
            new_images: Vec::new(),
            new_audio: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.partner_id.is_some()
    }

    pub fn apply(&mut self, changes: FieldChanges) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(age) = changes.age {
            self.age = age;
        }
        if let Some(location) = changes.location {
            self.location = location;
        }
        if let Some(notes) = changes.notes {
            self.notes = notes;
        }
    }

    /// Replace the pending image selection
    ///
    /// A new selection replaces the previous one rather than adding to it.
    pub fn set_new_images(&mut self, files: Vec<FileUpload>) -> Result<()> {
        if let Some(bad) = files.iter().find(|f| !f.has_mime_prefix(IMAGE_MIME_PREFIX)) {
            return Err(AppError::InvalidInput(format!(
                "{} is not an image ({})",
                bad.file_name, bad.content_type
            )));
        }
        self.new_images = files;
        Ok(())
    }

    /// Set or clear the pending audio file
    pub fn set_new_audio(&mut self, file: Option<FileUpload>) -> Result<()> {
        if let Some(file) = &file {
            if !file.has_mime_prefix(AUDIO_MIME_PREFIX) {
                return Err(AppError::InvalidInput(format!(
                    "{} is not an audio file ({})",
                    file.file_name, file.content_type
                )));
            }
        }
        self.new_audio = file;
        Ok(())
    }

    /// Reorder the existing-image snapshot
    pub fn reorder_images(&mut self, from_index: usize, target_index: usize) -> Result<()> {
        images::move_image(&mut self.images, from_index, target_index)
    }

    /// Check the text fields
    pub fn validate(&self) -> Result<ValidatedFields> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let age = match self.age.trim() {
            "" => None,
            text => Some(text.parse::<u32>().map_err(|_| {
                AppError::Validation(format!("Age must be a whole number of 0 or more, got {:?}", text))
            })?),
        };

        Ok(ValidatedFields {
            name: name.to_string(),
            age,
            location: non_blank(&self.location),
            notes: non_blank(&self.notes),
        })
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Serializable view of the buffer (file contents omitted)
#[derive(Debug, Clone, Serialize)]
pub struct EditBufferView {
    pub partner_id: Option<i64>,
    pub editing: bool,
    pub name: String,
    pub age: String,
    pub location: String,
    pub notes: String,
    pub images: Vec<ImageRef>,
    pub audio_url: Option<String>,
    pub new_images: Vec<PendingFile>,
    pub new_audio: Option<PendingFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingFile {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

impl From<&FileUpload> for PendingFile {
    fn from(file: &FileUpload) -> Self {
        Self {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            size: file.bytes.len(),
        }
    }
}

impl From<&EditBuffer> for EditBufferView {
    fn from(buffer: &EditBuffer) -> Self {
        Self {
            partner_id: buffer.partner_id,
            editing: buffer.is_editing(),
            name: buffer.name.clone(),
            age: buffer.age.clone(),
            location: buffer.location.clone(),
            notes: buffer.notes.clone(),
            images: buffer.images.clone(),
            audio_url: buffer.audio_url.clone(),
            new_images: buffer.new_images.iter().map(PendingFile::from).collect(),
            new_audio: buffer.new_audio.as_ref().map(PendingFile::from),
        }
    }
}

/// What a successful submit wrote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPartner {
    /// Id of the written record (store-assigned for inserts)
    pub id: Option<i64>,
    pub created: bool,
    pub images: Vec<ImageRef>,
    pub audio_url: Option<String>,
}

pub struct FormReconciler {
    rows: Arc<dyn RowStore>,
    uploader: AssetUploader,
    table: String,
}

impl FormReconciler {
    pub fn new(rows: Arc<dyn RowStore>, uploader: AssetUploader, table: &str) -> Self {
        Self {
            rows,
            uploader,
            table: table.to_string(),
        }
    }

    /// Start a buffer: seeded from `existing`, or empty for a new record
    pub fn open(existing: Option<&PartnerRecord>) -> EditBuffer {
        existing.map_or_else(EditBuffer::new_record, EditBuffer::from_record)
    }

    /// Upload pending files and write the merged record
    ///
    /// `owner` is the identity current at submit time. On error nothing has
    /// been written and `buffer` is untouched, so the caller can retry.
    pub async fn submit(&self, buffer: &EditBuffer, owner: &User) -> Result<SavedPartner> {
        let fields = buffer.validate()?;

        let uploaded = match self.uploader.upload_images(&buffer.new_images).await {
            Ok(images) => images,
            Err(failure) => {
                log_orphans(&failure.uploaded, None);
                return Err(AppError::Upload(failure.error));
            }
        };

        let audio_url = match &buffer.new_audio {
            Some(file) => match self.uploader.upload_audio(file).await {
                Ok(url) => Some(url),
                Err(e) => {
                    log_orphans(&uploaded, None);
                    return Err(AppError::Upload(e));
                }
            },
            None => buffer.audio_url.clone(),
        };

        let mut images = buffer.images.clone();
        images.extend(uploaded.iter().cloned());

        let row = PartnerWrite {
            name: fields.name,
            age: fields.age,
            location: fields.location,
            notes: fields.notes,
            images: images.clone(),
            audio_url: audio_url.clone(),
            user_id: owner.id.clone(),
        }
        .into_row();

        let written = match buffer.partner_id {
            Some(id) => self
                .rows
                .update(&self.table, row, &Filter::by_id(id))
                .await
                .map(|_| Some(id)),
            None => self
                .rows
                .insert(&self.table, row)
                .await
                .map(|stored| stored.get(columns::ID).and_then(|v| v.as_i64())),
        };

        let id = match written {
            Ok(id) => id,
            Err(e) => {
                let new_audio = buffer.new_audio.as_ref().and(audio_url.as_deref());
                log_orphans(&uploaded, new_audio);
                return Err(AppError::Store(e));
            }
        };

        info!(
            partner_id = ?id,
            images = images.len(),
            new_images = uploaded.len(),
            "Saved partner"
        );

        Ok(SavedPartner {
            id,
            created: buffer.partner_id.is_none(),
            images,
            audio_url,
        })
    }
}

fn log_orphans(images: &[ImageRef], audio_url: Option<&str>) {
    for image in images {
        warn!(url = %image.url, "Uploaded image left unreferenced after failed submit");
    }
    if let Some(url) = audio_url {
        warn!(url = %url, "Uploaded audio left unreferenced after failed submit");
    }
}
