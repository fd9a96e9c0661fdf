//! Session holder
//!
//! Single process-wide owner of the signed-in identity. Components that need
//! the identity receive a reference to the holder instead of reading global
//! state. Lifecycle: resolved once on startup, updated on sign-in, cleared on
//! sign-out.

use crate::error::{AppError, Result};
use pl_common::backend::{IdentityService, User};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Snapshot of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub user: Option<User>,
    /// True until the initial lookup finishes
    pub loading: bool,
}

pub struct SessionHolder {
    identity: Arc<dyn IdentityService>,
    state: RwLock<SessionState>,
}

impl SessionHolder {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            identity,
            state: RwLock::new(SessionState {
                user: None,
                loading: true,
            }),
        }
    }

    /// Resolve the current identity once at startup
    ///
    /// A lookup failure resolves to "signed out".
    pub async fn initialize(&self) -> Option<User> {
        let user = match self.identity.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!("Session lookup failed, continuing signed out: {}", e);
                None
            }
        };

        let mut state = self.state.write().await;
        state.user = user.clone();
        state.loading = false;
        user
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// Identity for a mutating action, or [`AppError::AuthRequired`]
    ///
    /// Never calls the identity provider.
    pub async fn require_user(&self) -> Result<User> {
        self.current_user().await.ok_or(AppError::AuthRequired)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        self.identity
            .sign_up(email, password)
            .await
            .map_err(AppError::Identity)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(AppError::Identity)?;

        let mut state = self.state.write().await;
        state.user = Some(user.clone());
        state.loading = false;
        info!(user_id = %user.id, "Session started");
        Ok(user)
    }

    /// End the session
    ///
    /// The local identity is cleared even when the provider call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let previous = self.state.write().await.user.take();
        if let Some(user) = previous {
            info!(user_id = %user.id, "Session ended");
        }

        self.identity.sign_out().await.map_err(AppError::Identity)
    }
}
