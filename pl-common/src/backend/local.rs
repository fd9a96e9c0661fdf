//! Local collaborators for development without a hosted project
//!
//! - [`LocalIdentity`]: in-process account table with salted SHA-256 passwords
//! - [`LocalObjectStore`]: files under a directory, served by the partners service

use super::{IdentityService, ObjectStore, User};
use crate::{Error, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: User,
    salt: String,
    password_hash: String,
}

/// In-process identity provider
///
/// Accounts live for the lifetime of the process.
#[derive(Default)]
pub struct LocalIdentity {
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<User>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl IdentityService for LocalIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidInput("Unable to validate email address: invalid format".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(Error::InvalidInput("User already registered".to_string()));
        }

        let salt = to_hex(&rand::random::<[u8; 16]>());
        let account = Account {
            user: User {
                id: uuid::Uuid::new_v4().to_string(),
                email: Some(email.clone()),
            },
            password_hash: hash_password(&salt, password),
            salt,
        };
        info!(user_id = %account.user.id, "Registered local account");
        accounts.insert(email, account);
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.read().await;
        let user = accounts
            .get(&email)
            .filter(|account| hash_password(&account.salt, password) == account.password_hash)
            .map(|account| account.user.clone())
            .ok_or_else(|| Error::Unauthorized("Invalid login credentials".to_string()))?;

        *self.session.write().await = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.write().await = None;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.session.read().await.clone())
    }
}

/// Object store backed by a directory
///
/// Objects are written to `root/{bucket}/{path}` and addressed as
/// `{public_base}/storage/{bucket}/{path}`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Directory served under `/storage`
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_file(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        for part in [bucket, path] {
            let plain = !part.is_empty()
                && Path::new(part)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return Err(Error::InvalidInput(format!("invalid object path: {}/{}", bucket, path)));
            }
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, bucket: &str, path: &str, _content_type: &str, bytes: Bytes) -> Result<()> {
        let file_path = self.object_file(bucket, path)?;
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::InvalidInput(format!("The resource already exists: {}/{}", bucket, path))
                }
                _ => Error::Io(e),
            })?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!(path = %file_path.display(), size = bytes.len(), "Stored object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base, bucket, path)
    }
}
