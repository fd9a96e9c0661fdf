//! Partner data model
//!
//! Rows arrive from the row store as loosely-typed JSON maps. They are
//! decoded here into [`PartnerRecord`], the only shape the rest of the code
//! sees. The `images` column in particular is untrusted: anything that is not
//! an array of `{ "url": <string> }` objects is dropped.

use crate::backend::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Default row store table holding partner records
pub const PARTNER_TABLE: &str = "partner";

/// Column names used by the partner table
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const LOCATION: &str = "location";
    pub const NOTES: &str = "notes";
    pub const IMAGES: &str = "images";
    pub const AUDIO_URL: &str = "audio_url";
    pub const CREATED_AT: &str = "created_at";
    pub const USER_ID: &str = "user_id";
}

/// Reference to an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Persisted partner record
///
/// `images[0]` is the primary image. The order of `images` is meaningful and
/// only changes through an explicit reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerRecord {
    /// Store-assigned identifier
    pub id: i64,
    pub name: String,
    pub age: Option<u32>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<ImageRef>,
    pub audio_url: Option<String>,
    /// Creation time; sole sort key for listing
    pub created_at: Option<DateTime<Utc>>,
    /// Identity that created the record
    pub owner_id: Option<String>,
}

impl PartnerRecord {
    /// Decode a raw row
    ///
    /// Returns `None` for rows without a numeric `id`; such a row can neither
    /// be edited nor deleted, so it is not displayed.
    pub fn from_row(row: &Row) -> Option<Self> {
        let id = row.get(columns::ID).and_then(Value::as_i64)?;

        Some(Self {
            id,
            name: text(row, columns::NAME).unwrap_or_default(),
            age: row
                .get(columns::AGE)
                .and_then(Value::as_u64)
                .and_then(|age| u32::try_from(age).ok()),
            location: text(row, columns::LOCATION),
            notes: text(row, columns::NOTES),
            images: normalize_images(row.get(columns::IMAGES)),
            audio_url: text(row, columns::AUDIO_URL),
            created_at: text(row, columns::CREATED_AT).and_then(|s| parse_timestamp(&s)),
            owner_id: text(row, columns::USER_ID),
        })
    }

    /// Primary image (position 0), if any
    pub fn primary_image(&self) -> Option<&ImageRef> {
        self.images.first()
    }
}

/// Decode every row, dropping the ones [`PartnerRecord::from_row`] rejects
pub fn records_from_rows(rows: &[Row]) -> Vec<PartnerRecord> {
    rows.iter()
        .filter_map(|row| {
            let record = PartnerRecord::from_row(row);
            if record.is_none() {
                warn!("Skipping partner row without numeric id: {:?}", row.get(columns::ID));
            }
            record
        })
        .collect()
}

/// Normalize the stored `images` value
///
/// - missing, null, or non-array values become an empty list
/// - array elements are kept only when they are objects with a string `url`
/// - other elements are dropped, never replaced
pub fn normalize_images(value: Option<&Value>) -> Vec<ImageRef> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                item.as_object()?
                    .get("url")?
                    .as_str()
                    .map(ImageRef::new)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_string)
}

/// Parse an RFC 3339 timestamp as produced by Postgres or the local store
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Column values written on insert or update
///
/// `id` and `created_at` are never written: the store assigns both once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerWrite {
    pub name: String,
    pub age: Option<u32>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<ImageRef>,
    pub audio_url: Option<String>,
    pub user_id: String,
}

impl PartnerWrite {
    /// Convert into a row-store row (nulls are written explicitly)
    pub fn into_row(self) -> Row {
        let mut row = Row::new();
        row.insert(columns::NAME.into(), Value::String(self.name));
        row.insert(columns::AGE.into(), self.age.map_or(Value::Null, Value::from));
        row.insert(columns::LOCATION.into(), opt_string(self.location));
        row.insert(columns::NOTES.into(), opt_string(self.notes));
        row.insert(
            columns::IMAGES.into(),
            Value::Array(
                self.images
                    .into_iter()
                    .map(|image| serde_json::json!({ "url": image.url }))
                    .collect(),
            ),
        );
        row.insert(columns::AUDIO_URL.into(), opt_string(self.audio_url));
        row.insert(columns::USER_ID.into(), Value::String(self.user_id));
        row
    }
}

fn opt_string(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}
