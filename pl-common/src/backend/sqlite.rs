//! SQLite row store
//!
//! Local stand-in for the hosted relational store. Rows are exchanged as JSON
//! maps exactly like the hosted REST API, so callers cannot tell the two
//! apart. JSON-typed columns (`images`) are kept as text and decoded on the
//! way out.

use super::{check_identifier, Filter, OrderBy, Row, RowStore};
use crate::partner::columns;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Row store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteRowStore {
    pool: SqlitePool,
    json_columns: HashSet<String>,
}

impl SqliteRowStore {
    /// Open (creating if missing) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        info!("Opening row store: {}", db_path.display());
        Self::connect(&url, 5).await
    }

    /// Private in-memory database (one connection, so every query sees the same data)
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self {
            pool,
            json_columns: [columns::IMAGES.to_string()].into_iter().collect(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the partner table if it does not exist
    pub async fn ensure_partner_table(&self, table: &str) -> Result<()> {
        check_identifier(table)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                age INTEGER,
                location TEXT,
                notes TEXT,
                image_url TEXT,
                images TEXT,
                audio_url TEXT,
                created_at TEXT NOT NULL,
                user_id TEXT
            )",
            table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!("Ensured table {}", table);
        Ok(())
    }

    fn row_to_json(&self, row: &SqliteRow) -> Row {
        let mut out = Row::new();
        for (i, column) in row.columns().iter().enumerate() {
            let name = column.name();
            let value = match row.try_get_raw(i) {
                Ok(raw) if raw.is_null() => Value::Null,
                Ok(raw) => {
                    let type_name = raw.type_info().name().to_string();
                    match type_name.as_str() {
                        "INTEGER" => row.try_get::<i64, _>(i).map(Value::from).unwrap_or(Value::Null),
                        "REAL" => row.try_get::<f64, _>(i).map(Value::from).unwrap_or(Value::Null),
                        "TEXT" => row
                            .try_get::<String, _>(i)
                            .map(|text| self.decode_text(name, text))
                            .unwrap_or(Value::Null),
                        _ => Value::Null,
                    }
                }
                Err(_) => Value::Null,
            };
            out.insert(name.to_string(), value);
        }
        out
    }

    fn decode_text(&self, column: &str, text: String) -> Value {
        if self.json_columns.contains(column) {
            // Undecodable text stays a plain string; the reader decides what that means
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        }
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn order_clause(order: Option<&OrderBy>) -> Result<String> {
    match order {
        Some(order) => {
            check_identifier(&order.column)?;
            let direction = if order.descending { "DESC" } else { "ASC" };
            // rowid breaks ties between rows created within the same millisecond
            Ok(format!(" ORDER BY {} {}, rowid {}", order.column, direction, direction))
        }
        None => Ok(String::new()),
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn select(
        &self,
        table: &str,
        filter: Option<&Filter>,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Row>> {
        check_identifier(table)?;
        let mut sql = format!("SELECT * FROM {}", table);
        if let Some(filter) = filter {
            check_identifier(&filter.column)?;
            sql.push_str(&format!(" WHERE {} = ?", filter.column));
        }
        sql.push_str(&order_clause(order)?);

        let mut query = sqlx::query(&sql);
        if let Some(filter) = filter {
            query = bind_value(query, &filter.value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| self.row_to_json(row)).collect())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        check_identifier(table)?;
        row.remove(columns::ID);
        row.entry(columns::CREATED_AT.to_string()).or_insert_with(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });

        let names: Vec<&String> = row.keys().collect();
        for name in &names {
            check_identifier(name)?;
        }
        let placeholders = vec!["?"; names.len()].join(", ");
        let column_list = names.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table, column_list, placeholders
        );

        let mut query = sqlx::query(&sql);
        for value in row.values() {
            query = bind_value(query, value);
        }

        let stored = query.fetch_one(&self.pool).await?;
        Ok(self.row_to_json(&stored))
    }

    async fn update(&self, table: &str, mut row: Row, filter: &Filter) -> Result<()> {
        check_identifier(table)?;
        check_identifier(&filter.column)?;
        row.remove(columns::ID);
        row.remove(columns::CREATED_AT);
        if row.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::with_capacity(row.len());
        for name in row.keys() {
            check_identifier(name)?;
            assignments.push(format!("{} = ?", name));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            filter.column
        );

        let mut query = sqlx::query(&sql);
        for value in row.values() {
            query = bind_value(query, value);
        }
        query = bind_value(query, &filter.value);

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} where {} = {}", table, filter.column, filter.value)));
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        check_identifier(table)?;
        check_identifier(&filter.column)?;
        let sql = format!("DELETE FROM {} WHERE {} = ?", table, filter.column);

        let result = bind_value(sqlx::query(&sql), &filter.value)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} where {} = {}", table, filter.column, filter.value)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteRowStore {
        let store = SqliteRowStore::in_memory().await.unwrap();
        store.ensure_partner_table("partner").await.unwrap();
        store
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_created_at() {
        let store = store().await;
        let stored = store
            .insert("partner", row(json!({ "name": "Aki", "images": [{ "url": "a" }] })))
            .await
            .unwrap();

        assert!(stored["id"].as_i64().is_some());
        assert!(stored["created_at"].is_string());
        assert_eq!(stored["images"], json!([{ "url": "a" }]));
        assert_eq!(stored["audio_url"], Value::Null);
    }

    #[tokio::test]
    async fn test_select_orders_newest_first() {
        let store = store().await;
        for name in ["first", "second", "third"] {
            store.insert("partner", row(json!({ "name": name }))).await.unwrap();
        }

        let rows = store
            .select("partner", None, Some(&OrderBy::desc("created_at")))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_undecodable_json_column_stays_text() {
        let store = store().await;
        sqlx::query("INSERT INTO partner (name, images, created_at) VALUES ('x', 'not json', '2024-01-01T00:00:00.000Z')")
            .execute(store.pool())
            .await
            .unwrap();

        let rows = store.select("partner", None, None).await.unwrap();
        assert_eq!(rows[0]["images"], json!("not json"));
    }

    #[tokio::test]
    async fn test_update_and_delete_by_id() {
        let store = store().await;
        let stored = store.insert("partner", row(json!({ "name": "old" }))).await.unwrap();
        let id = stored["id"].as_i64().unwrap();

        store
            .update("partner", row(json!({ "name": "new", "age": 30 })), &Filter::by_id(id))
            .await
            .unwrap();
        let rows = store.select("partner", Some(&Filter::by_id(id)), None).await.unwrap();
        assert_eq!(rows[0]["name"], "new");
        assert_eq!(rows[0]["age"], 30);
        assert_eq!(rows[0]["created_at"], stored["created_at"]);

        store.delete("partner", &Filter::by_id(id)).await.unwrap();
        assert!(store.select("partner", None, None).await.unwrap().is_empty());
        assert!(matches!(
            store.delete("partner", &Filter::by_id(id)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_identifiers() {
        let store = store().await;
        assert!(store.select("partner; DROP TABLE partner", None, None).await.is_err());
        assert!(store
            .insert("partner", row(json!({ "name) VALUES ('x'); --": 1 })))
            .await
            .is_err());
    }
}
