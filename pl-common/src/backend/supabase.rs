//! Hosted backend client (Supabase-compatible HTTP APIs)
//!
//! One client implements all three collaborator traits, because the access
//! token obtained at sign-in must accompany every later storage and row
//! request.
//!
//! Endpoints used:
//! - `/auth/v1/signup`, `/auth/v1/token?grant_type=password`, `/auth/v1/logout`, `/auth/v1/user`
//! - `/storage/v1/object/{bucket}/{path}`
//! - `/rest/v1/{table}` (PostgREST query syntax)

use super::{check_identifier, Filter, IdentityService, ObjectStore, OrderBy, Row, RowStore, User};
use crate::{Error, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("partner-list/", env!("CARGO_PKG_VERSION"));

/// Client for a hosted project
pub struct SupabaseClient {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url` using its public anon key
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
        })
    }

    /// Whether a session token is currently held
    pub async fn has_session(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());

        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn rest_path(table: &str) -> Result<String> {
        check_identifier(table)?;
        Ok(format!("/rest/v1/{}", table))
    }
}

/// Turn a non-success response into [`Error::Api`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        }),
    })
}

/// Pull the human-readable message out of an error body
///
/// The auth, storage and REST services each use a different field name.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// PostgREST `eq.` operand
fn filter_operand(value: &Value) -> String {
    match value {
        Value::String(s) => format!("eq.{}", s),
        other => format!("eq.{}", other),
    }
}

fn filter_query(filter: &Filter) -> Result<(String, String)> {
    check_identifier(&filter.column)?;
    Ok((filter.column.clone(), filter_operand(&filter.value)))
}

#[async_trait]
impl IdentityService for SupabaseClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        debug!(email = %email, "Signing up");
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .await
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        debug!(email = %email, "Signing in");
        let response = self
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .await
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        *self.access_token.write().await = Some(token.access_token);
        info!(user_id = %token.user.id, "Signed in");
        Ok(token.user)
    }

    async fn sign_out(&self) -> Result<()> {
        let token = self.access_token.write().await.take();
        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        if !self.has_session().await {
            return Ok(None);
        }

        let response = self.request(Method::GET, "/auth/v1/user").await.send().await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Expired or revoked token
            *self.access_token.write().await = None;
            return Ok(None);
        }
        let user: User = check(response).await?.json().await?;
        Ok(Some(user))
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Bytes) -> Result<()> {
        debug!(bucket = %bucket, path = %path, size = bytes.len(), "Uploading object");
        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", bucket, path))
            .await
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl RowStore for SupabaseClient {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Row>> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        if let Some(filter) = filter {
            query.push(filter_query(filter)?);
        }
        if let Some(order) = order {
            check_identifier(&order.column)?;
            let direction = if order.descending { "desc" } else { "asc" };
            query.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }

        debug!(table = %table, "Selecting rows");
        let response = self
            .request(Method::GET, &Self::rest_path(table)?)
            .await
            .query(&query)
            .send()
            .await?;
        let rows: Vec<Row> = check(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        debug!(table = %table, "Inserting row");
        let response = self
            .request(Method::POST, &Self::rest_path(table)?)
            .await
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let mut rows: Vec<Row> = check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(Error::Parse("insert returned no row".to_string()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> Result<()> {
        debug!(table = %table, column = %filter.column, "Updating rows");
        let response = self
            .request(Method::PATCH, &Self::rest_path(table)?)
            .await
            .query(&[filter_query(filter)?])
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        debug!(table = %table, column = %filter.column, "Deleting rows");
        let response = self
            .request(Method::DELETE, &Self::rest_path(table)?)
            .await
            .query(&[filter_query(filter)?])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
