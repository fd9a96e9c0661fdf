//! Shared helpers for pl-partners integration tests
//!
//! Wraps the local collaborators in call-recording doubles so tests can
//! assert exactly which network calls an action issued.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, Request},
    Router,
};
use pl_common::backend::local::{LocalIdentity, LocalObjectStore};
use pl_common::backend::sqlite::SqliteRowStore;
use pl_common::backend::{Backend, Filter, IdentityService, ObjectStore, OrderBy, Row, RowStore, User};
use pl_common::{Error, EventBus, Result};
use pl_partners::{build_router, AppState, PartnerApp, PartnerSettings};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const EMAIL: &str = "aki@example.com";
pub const PASSWORD: &str = "secret1";

/// One recorded row store call
#[derive(Debug, Clone, PartialEq)]
pub enum RowCall {
    Select,
    Insert(Row),
    Update(Row, Filter),
    Delete(Filter),
}

pub struct RecordingRows {
    pub inner: SqliteRowStore,
    calls: Mutex<Vec<RowCall>>,
    fail_writes: AtomicBool,
}

impl RecordingRows {
    pub fn calls(&self) -> Vec<RowCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: RowCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Api {
                status: 500,
                message: "row store unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RowStore for RecordingRows {
    async fn select(&self, table: &str, filter: Option<&Filter>, order: Option<&OrderBy>) -> Result<Vec<Row>> {
        self.record(RowCall::Select);
        self.inner.select(table, filter, order).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        self.record(RowCall::Insert(row.clone()));
        self.check_write()?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> Result<()> {
        self.record(RowCall::Update(row.clone(), filter.clone()));
        self.check_write()?;
        self.inner.update(table, row, filter).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        self.record(RowCall::Delete(filter.clone()));
        self.check_write()?;
        self.inner.delete(table, filter).await
    }
}

pub struct RecordingObjects {
    pub inner: LocalObjectStore,
    uploads: AtomicUsize,
    fail: AtomicBool,
    fail_call: AtomicUsize,
}

impl RecordingObjects {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.uploads.store(0, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only the n-th upload (1-based) counted since the last reset; 0 disables
    pub fn fail_call(&self, n: usize) {
        self.fail_call.store(n, Ordering::SeqCst);
    }

    /// Number of objects stored in `bucket`
    pub fn stored(&self, bucket: &str) -> usize {
        std::fs::read_dir(self.inner.root().join(bucket))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for RecordingObjects {
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Bytes) -> Result<()> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) || self.fail_call.load(Ordering::SeqCst) == n {
            return Err(Error::Network("connection reset".to_string()));
        }
        self.inner.upload(bucket, path, content_type, bytes).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }
}

pub struct RecordingIdentity {
    pub inner: LocalIdentity,
    calls: AtomicUsize,
}

impl RecordingIdentity {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityService for RecordingIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_up(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_out().await
    }

    async fn current_user(&self) -> Result<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.current_user().await
    }
}

/// A started app over recording collaborators
pub struct TestEnv {
    pub dir: TempDir,
    pub rows: Arc<RecordingRows>,
    pub objects: Arc<RecordingObjects>,
    pub identity: Arc<RecordingIdentity>,
    pub app: Arc<PartnerApp>,
    router: Router,
}

impl TestEnv {
    /// Started app with one registered (signed-out) account
    pub async fn new() -> Self {
        let env = Self::unstarted().await;
        env.app.start().await;
        env
    }

    /// Same as [`TestEnv::new`] but before the startup session lookup and fetch
    pub async fn unstarted() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let sqlite = SqliteRowStore::in_memory().await.unwrap();
        sqlite.ensure_partner_table("partner").await.unwrap();
        let rows = Arc::new(RecordingRows {
            inner: sqlite,
            calls: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        });

        let objects = Arc::new(RecordingObjects {
            inner: LocalObjectStore::new(dir.path().join("storage"), "http://localhost:5780"),
            uploads: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_call: AtomicUsize::new(0),
        });

        let local_identity = LocalIdentity::new();
        local_identity.sign_up(EMAIL, PASSWORD).await.unwrap();
        let identity = Arc::new(RecordingIdentity {
            inner: local_identity,
            calls: AtomicUsize::new(0),
        });

        let backend = Backend::new(identity.clone(), objects.clone(), rows.clone());
        let app = Arc::new(PartnerApp::new(
            backend,
            &PartnerSettings::default(),
            Arc::new(EventBus::new(64)),
        ));

        let router = build_router(AppState::new(app.clone(), Some(dir.path().join("storage"))));

        Self {
            dir,
            rows,
            objects,
            identity,
            app,
            router,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Forget every recorded call so far
    pub fn reset_calls(&self) {
        self.rows.reset();
        self.objects.reset();
        self.identity.reset();
    }

    /// Total collaborator calls since the last reset
    pub fn network_calls(&self) -> usize {
        self.rows.calls().len() + self.objects.uploads() + self.identity.calls()
    }

    pub async fn sign_in(&self) {
        self.app.sign_in(EMAIL, PASSWORD).await.unwrap();
    }

    /// Insert a row with a fixed id, bypassing the recorder
    pub async fn seed_partner(&self, id: i64, name: &str, images: Value, created_at: &str) {
        sqlx::query("INSERT INTO partner (id, name, images, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(images.to_string())
            .bind(created_at)
            .execute(self.rows.inner.pool())
            .await
            .unwrap();
    }

    /// Set the audio column of a seeded row
    pub async fn seed_audio(&self, id: i64, audio_url: &str) {
        sqlx::query("UPDATE partner SET audio_url = ? WHERE id = ?")
            .bind(audio_url)
            .bind(id)
            .execute(self.rows.inner.pool())
            .await
            .unwrap();
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "pl-test-boundary";

/// Multipart request with one part per `(file_name, content_type, bytes)`
pub fn multipart_request(method: &str, uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (file_name, content_type, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
