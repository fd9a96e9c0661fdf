//! Collaborator contracts
//!
//! The application talks to three hosted services only through these traits:
//! - [`IdentityService`]: sign-up, sign-in, sign-out, current user
//! - [`ObjectStore`]: binary upload and public address issuance
//! - [`RowStore`]: select/insert/update/delete on loosely-typed rows
//!
//! Two implementations exist: [`supabase`] talks to a hosted Supabase-compatible
//! project over HTTP; [`local`] and [`sqlite`] keep everything on this machine
//! for development.

use crate::config::{BackendConfig, BackendKind};
use crate::{Error, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub mod local;
#[cfg(feature = "sqlx")]
pub mod sqlite;
pub mod supabase;

/// A row as exchanged with the row store: column name → JSON value
pub type Row = serde_json::Map<String, Value>;

/// Equality filter (`column = value`)
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Filter on the `id` column
    pub fn by_id(id: i64) -> Self {
        Self::eq("id", id)
    }
}

/// Sort order for `select`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A file chosen by the user, not yet uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    /// Original file name as selected
    pub file_name: String,
    /// MIME type as declared by the client
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Text after the last `.` of the file name, if any
    ///
    /// Only ASCII letters and digits qualify; anything else (`x.png?y`,
    /// `a.b/c`) yields None so it never reaches an object path or URL.
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
    }

    /// Whether the declared MIME type falls under `prefix` (e.g. `image/`)
    pub fn has_mime_prefix(&self, prefix: &str) -> bool {
        self.content_type.starts_with(prefix)
    }

    /// Fresh object path: random UUID plus the original extension
    ///
    /// Every call yields a new path, so an upload never overwrites an
    /// existing object.
    pub fn object_path(&self) -> String {
        let id = uuid::Uuid::new_v4();
        match self.extension() {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        }
    }
}

/// Identity provider contract
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Register a new account. Does not sign in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<()>;

    /// Authenticate and start a session
    async fn sign_in(&self, email: &str, password: &str) -> Result<User>;

    /// End the current session
    async fn sign_out(&self) -> Result<()>;

    /// Identity of the current session, if any
    async fn current_user(&self) -> Result<Option<User>>;
}

/// Object storage contract
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `bucket/path`. Existing objects are never overwritten.
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Bytes) -> Result<()>;

    /// Durable public address of `bucket/path`
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Relational row store contract
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Row>>;

    /// Insert one row; returns the stored row including generated columns
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> Result<()>;

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()>;
}

/// The three collaborators, shared by every component
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityService>,
    pub objects: Arc<dyn ObjectStore>,
    pub rows: Arc<dyn RowStore>,
}

impl Backend {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        objects: Arc<dyn ObjectStore>,
        rows: Arc<dyn RowStore>,
    ) -> Self {
        Self {
            identity,
            objects,
            rows,
        }
    }

    /// Build the collaborators selected by configuration
    ///
    /// # Arguments
    /// * `config` - Backend section of the resolved configuration
    /// * `public_base` - Base URL this process serves local storage under
    pub async fn from_config(config: &BackendConfig, public_base: &str) -> Result<Self> {
        config.validate()?;

        match config.kind {
            BackendKind::Supabase => {
                let url = config.url.as_deref().unwrap_or_default();
                let key = config.anon_key.as_deref().unwrap_or_default();
                info!("Using hosted backend at {}", url);
                let client = Arc::new(supabase::SupabaseClient::new(url, key)?);
                Ok(Self::new(client.clone(), client.clone(), client))
            }
            BackendKind::Local => {
                let data_dir = config.data_dir();
                info!("Using local backend in {}", data_dir.display());
                tokio::fs::create_dir_all(&data_dir).await?;
                let objects = local::LocalObjectStore::new(data_dir.join("storage"), public_base);
                let rows = open_local_rows(config, &data_dir).await?;
                Ok(Self::new(
                    Arc::new(local::LocalIdentity::new()),
                    Arc::new(objects),
                    rows,
                ))
            }
        }
    }
}

#[cfg(feature = "sqlx")]
async fn open_local_rows(config: &BackendConfig, data_dir: &std::path::Path) -> Result<Arc<dyn RowStore>> {
    let store = sqlite::SqliteRowStore::open(&data_dir.join("partner-list.db")).await?;
    store.ensure_partner_table(&config.table).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlx"))]
async fn open_local_rows(_config: &BackendConfig, _data_dir: &std::path::Path) -> Result<Arc<dyn RowStore>> {
    Err(Error::Config(
        "local backend requires the `sqlx` feature".to_string(),
    ))
}

/// Table and column names must be plain identifiers
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn check_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid identifier: {:?}", name)))
    }
}
