//! Partner list application
//!
//! Wires the components together and owns the process-wide state: the
//! session, the displayed list, the single edit buffer and the pending
//! deletion. Every user-visible outcome is published as a notice on the
//! event bus; failures are also returned to the caller.

use crate::cards::{self, PartnerCard};
use crate::deletion::{DeletionConfirmer, DeletionState};
use crate::error::{AppError, Result};
use crate::form::{EditBuffer, EditBufferView, FormReconciler, SavedPartner};
use crate::loader::PartnerListLoader;
use crate::session::{SessionHolder, SessionState};
use crate::uploader::AssetUploader;
use pl_common::backend::{Backend, User};
use pl_common::config::BackendConfig;
use pl_common::partner::PARTNER_TABLE;
use pl_common::{EventBus, Notice, PartnerRecord, PlEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Store locations used by the partner app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerSettings {
    pub table: String,
    pub images_bucket: String,
    pub audio_bucket: String,
}

impl Default for PartnerSettings {
    fn default() -> Self {
        Self {
            table: PARTNER_TABLE.to_string(),
            images_bucket: pl_common::config::DEFAULT_IMAGES_BUCKET.to_string(),
            audio_bucket: pl_common::config::DEFAULT_AUDIO_BUCKET.to_string(),
        }
    }
}

impl From<&BackendConfig> for PartnerSettings {
    fn from(config: &BackendConfig) -> Self {
        Self {
            table: config.table.clone(),
            images_bucket: config.images_bucket.clone(),
            audio_bucket: config.audio_bucket.clone(),
        }
    }
}

/// List as presented to the user
#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub partners: Vec<PartnerCard>,
    pub signed_in: bool,
    /// Shown instead of the cards when there are none
    pub empty_message: Option<&'static str>,
    /// False until the first fetch succeeds
    pub loaded: bool,
}

pub struct PartnerApp {
    bus: Arc<EventBus>,
    session: SessionHolder,
    loader: PartnerListLoader,
    reconciler: FormReconciler,
    deletion: DeletionConfirmer,
    form: Mutex<Option<EditBuffer>>,
    /// Serializes submits; held across uploads instead of `form`
    submitting: Mutex<()>,
}

impl PartnerApp {
    pub fn new(backend: Backend, settings: &PartnerSettings, bus: Arc<EventBus>) -> Self {
        let uploader = AssetUploader::new(
            backend.objects.clone(),
            &settings.images_bucket,
            &settings.audio_bucket,
        );

        Self {
            bus,
            session: SessionHolder::new(backend.identity.clone()),
            loader: PartnerListLoader::new(backend.rows.clone(), &settings.table),
            reconciler: FormReconciler::new(backend.rows.clone(), uploader, &settings.table),
            deletion: DeletionConfirmer::new(backend.rows, &settings.table),
            form: Mutex::new(None),
            submitting: Mutex::new(()),
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Resolve the session and load the list once
    ///
    /// Neither step is fatal: a failed lookup means signed out, a failed
    /// fetch leaves the list empty and is reported as a notice.
    pub async fn start(&self) {
        let user = self.session.initialize().await;
        match &user {
            Some(user) => info!(user_id = %user.id, "Resumed session"),
            None => info!("No active session"),
        }
        self.bus.emit_lossy(PlEvent::SessionChanged {
            user_id: user.map(|u| u.id),
        });

        let _ = self.refresh().await;
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub async fn session(&self) -> SessionState {
        self.session.snapshot().await
    }

    /// Register an account; the session is unchanged
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        self.report(self.session.sign_up(email, password).await)?;
        info!("Account registered");
        self.bus.notify(Notice::info(
            "Account created",
            "Check your e-mail to confirm your account",
        ));
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let user = self.report(self.session.sign_in(email, password).await)?;
        self.bus.emit_lossy(PlEvent::SessionChanged {
            user_id: Some(user.id.clone()),
        });
        Ok(user)
    }

    /// Sign out, discarding the open form and any pending deletion
    pub async fn sign_out(&self) -> Result<()> {
        if self.form.lock().await.take().is_some() {
            self.bus.emit_lossy(PlEvent::FormClosed);
        }
        self.deletion.cancel().await;

        let result = self.session.sign_out().await;
        self.bus.emit_lossy(PlEvent::SessionChanged { user_id: None });
        self.report(result)
    }

    // ========================================================================
    // List
    // ========================================================================

    /// Current list; fetched on first use
    pub async fn list(&self) -> ListView {
        if !self.loader.is_loaded().await {
            let _ = self.refresh().await;
        }

        let signed_in = self.session.current_user().await.is_some();
        let partners = self.loader.partners().await;
        ListView {
            empty_message: partners.is_empty().then(|| cards::empty_message(signed_in)),
            partners: cards::cards(&partners, signed_in),
            signed_in,
            loaded: self.loader.is_loaded().await,
        }
    }

    /// Re-fetch the list; returns the number of partners now displayed
    pub async fn refresh(&self) -> Result<usize> {
        let partners = self.report(self.loader.fetch().await)?;
        self.bus.emit_lossy(PlEvent::PartnersRefreshed {
            count: partners.len(),
        });
        Ok(partners.len())
    }

    // ========================================================================
    // Form
    // ========================================================================

    /// Open the form, empty or seeded from a displayed partner
    ///
    /// Replaces any buffer already open.
    pub async fn open_form(&self, partner_id: Option<i64>) -> Result<EditBufferView> {
        self.report(self.session.require_user().await)?;

        let existing = match partner_id {
            Some(id) => Some(self.report(self.loader.find(id).await.ok_or(AppError::NotFound(id)))?),
            None => None,
        };

        let buffer = FormReconciler::open(existing.as_ref());
        let view = EditBufferView::from(&buffer);
        *self.form.lock().await = Some(buffer);

        self.bus.emit_lossy(PlEvent::FormOpened { partner_id });
        Ok(view)
    }

    pub async fn form(&self) -> Result<EditBufferView> {
        self.form
            .lock()
            .await
            .as_ref()
            .map(EditBufferView::from)
            .ok_or_else(no_open_form)
    }

    /// Apply an edit to the open buffer
    pub async fn update_form<F>(&self, edit: F) -> Result<EditBufferView>
    where
        F: FnOnce(&mut EditBuffer) -> Result<()>,
    {
        let mut form = self.form.lock().await;
        let buffer = self.report(form.as_mut().ok_or_else(no_open_form))?;
        self.report(edit(&mut *buffer))?;
        Ok(EditBufferView::from(&*buffer))
    }

    /// Upload, write, close, refresh
    ///
    /// On failure the buffer stays open unchanged for a retry. The form stays
    /// readable while uploads run; it is closed afterwards only if it still
    /// holds the submitted buffer.
    pub async fn submit_form(&self) -> Result<SavedPartner> {
        let owner = self.report(self.session.require_user().await)?;

        let _submitting = self.submitting.lock().await;
        let buffer = self.report(self.form.lock().await.clone().ok_or_else(no_open_form))?;
        let saved = self.report(self.reconciler.submit(&buffer, &owner).await)?;

        {
            let mut form = self.form.lock().await;
            if form.as_ref() == Some(&buffer) {
                *form = None;
            }
        }

        self.bus.emit_lossy(PlEvent::FormClosed);
        self.bus.notify(Notice::info("Saved", "Partner information saved"));
        let _ = self.refresh().await;
        Ok(saved)
    }

    /// Discard the open buffer; true if one was open
    pub async fn close_form(&self) -> bool {
        let closed = self.form.lock().await.take().is_some();
        if closed {
            self.bus.emit_lossy(PlEvent::FormClosed);
        }
        closed
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Ask for confirmation before deleting a displayed partner
    pub async fn request_delete(&self, partner_id: i64) -> Result<PartnerRecord> {
        self.report(self.session.require_user().await)?;
        let partner = self.report(
            self.loader
                .find(partner_id)
                .await
                .ok_or(AppError::NotFound(partner_id)),
        )?;

        self.deletion.request(partner.clone()).await;
        self.bus.emit_lossy(PlEvent::DeletePending { partner_id });
        Ok(partner)
    }

    pub async fn confirm_delete(&self) -> Result<PartnerRecord> {
        self.report(self.session.require_user().await)?;
        let deleted = self.report(self.deletion.confirm().await)?;

        self.bus.notify(Notice::info("Deleted", "Partner information deleted"));
        let _ = self.refresh().await;
        Ok(deleted)
    }

    pub async fn cancel_delete(&self) -> bool {
        self.deletion.cancel().await
    }

    pub async fn deletion_state(&self) -> DeletionState {
        self.deletion.state().await
    }

    /// Publish the notice for a failure and pass the result through
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(kind = e.kind(), "{}", e);
            self.bus.notify(e.notice());
        }
        result
    }
}

fn no_open_form() -> AppError {
    AppError::InvalidState("No form is open".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldChanges;
    use pl_common::backend::local::{LocalIdentity, LocalObjectStore};
    use pl_common::backend::sqlite::SqliteRowStore;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use pl_common::backend::{FileUpload, IdentityService, ObjectStore};
    use std::time::Duration;
    use tokio::sync::Notify;

    async fn app(dir: &std::path::Path) -> PartnerApp {
        app_with_objects(Arc::new(LocalObjectStore::new(dir, "http://localhost"))).await
    }

    async fn app_with_objects(objects: Arc<dyn ObjectStore>) -> PartnerApp {
        let identity = Arc::new(LocalIdentity::new());
        identity.sign_up("aki@example.com", "secret1").await.unwrap();
        let rows = SqliteRowStore::in_memory().await.unwrap();
        rows.ensure_partner_table("partner").await.unwrap();
        let backend = Backend::new(identity, objects, Arc::new(rows));
        PartnerApp::new(backend, &PartnerSettings::default(), Arc::new(EventBus::new(64)))
    }

    /// Local store whose uploads wait until released
    struct GatedObjects {
        inner: LocalObjectStore,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ObjectStore for GatedObjects {
        async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Bytes) -> pl_common::Result<()> {
            self.started.notify_one();
            self.release.notified().await;
            self.inner.upload(bucket, path, content_type, bytes).await
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            self.inner.public_url(bucket, path)
        }
    }

    #[tokio::test]
    async fn test_signed_out_actions_are_refused_with_notice() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        app.start().await;
        let mut rx = app.event_bus().subscribe();

        assert!(matches!(app.open_form(None).await, Err(AppError::AuthRequired)));
        match rx.recv().await.unwrap() {
            PlEvent::Notice { notice } => assert_eq!(notice.title, "Sign in required"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(app.request_delete(1).await, Err(AppError::AuthRequired)));
        assert!(matches!(app.submit_form().await, Err(AppError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        app.start().await;
        assert_eq!(app.list().await.empty_message, Some(cards::EMPTY_SIGNED_OUT));

        app.sign_in("aki@example.com", "secret1").await.unwrap();
        app.open_form(None).await.unwrap();
        app.update_form(|buffer| {
            buffer.apply(FieldChanges {
                name: Some("Aki".into()),
                ..Default::default()
            });
            Ok(())
        })
        .await
        .unwrap();

        let saved = app.submit_form().await.unwrap();
        assert!(saved.created);
        assert!(matches!(app.form().await, Err(AppError::InvalidState(_))));

        let view = app.list().await;
        assert_eq!(view.partners.len(), 1);
        assert_eq!(view.partners[0].name, "Aki");
        assert_eq!(view.empty_message, None);
        assert!(view.partners[0].can_delete);
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        app.start().await;
        app.sign_in("aki@example.com", "secret1").await.unwrap();
        app.open_form(None).await.unwrap();

        assert!(matches!(app.submit_form().await, Err(AppError::Validation(_))));
        assert!(app.form().await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_discards_form_and_pending_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        app.start().await;
        app.sign_in("aki@example.com", "secret1").await.unwrap();
        app.open_form(None).await.unwrap();

        app.sign_out().await.unwrap();
        assert!(app.form().await.is_err());
        assert_eq!(app.deletion_state().await, DeletionState::Idle);
        assert!(app.session().await.user.is_none());
    }

    #[tokio::test]
    async fn test_form_stays_readable_during_submit() {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(GatedObjects {
            inner: LocalObjectStore::new(dir.path(), "http://localhost"),
            started: Notify::new(),
            release: Notify::new(),
        });
        let app = Arc::new(app_with_objects(objects.clone()).await);
        app.start().await;
        app.sign_in("aki@example.com", "secret1").await.unwrap();
        app.open_form(None).await.unwrap();
        app.update_form(|buffer| {
            buffer.apply(FieldChanges {
                name: Some("Aki".into()),
                ..Default::default()
            });
            buffer.set_new_images(vec![FileUpload::new("a.png", "image/png", b"a".to_vec())])
        })
        .await
        .unwrap();

        let submit = tokio::spawn({
            let app = app.clone();
            async move { app.submit_form().await }
        });
        objects.started.notified().await;

        let view = tokio::time::timeout(Duration::from_secs(5), app.form())
            .await
            .expect("form readable while uploading")
            .unwrap();
        assert_eq!(view.name, "Aki");

        objects.release.notify_one();
        let saved = submit.await.unwrap().unwrap();
        assert_eq!(saved.images.len(), 1);
        assert!(app.form().await.is_err());
    }

    #[tokio::test]
    async fn test_form_reopened_during_submit_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(GatedObjects {
            inner: LocalObjectStore::new(dir.path(), "http://localhost"),
            started: Notify::new(),
            release: Notify::new(),
        });
        let app = Arc::new(app_with_objects(objects.clone()).await);
        app.start().await;
        app.sign_in("aki@example.com", "secret1").await.unwrap();
        app.open_form(None).await.unwrap();
        app.update_form(|buffer| {
            buffer.name = "Aki".into();
            buffer.set_new_images(vec![FileUpload::new("a.png", "image/png", b"a".to_vec())])
        })
        .await
        .unwrap();

        let submit = tokio::spawn({
            let app = app.clone();
            async move { app.submit_form().await }
        });
        objects.started.notified().await;

        // A fresh form opened mid-submit is not closed by the finishing submit
        app.open_form(None).await.unwrap();
        objects.release.notify_one();
        submit.await.unwrap().unwrap();

        let view = app.form().await.unwrap();
        assert_eq!(view.name, "");
    }
}
