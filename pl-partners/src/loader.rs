//! Partner list loader
//!
//! Fetches every partner row newest first and keeps the last good list. A
//! failed fetch leaves the previous list (or the empty initial list) in place.

use crate::error::{AppError, Result};
use pl_common::backend::{OrderBy, RowStore};
use pl_common::partner::{columns, records_from_rows};
use pl_common::PartnerRecord;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct ListState {
    partners: Vec<PartnerRecord>,
    loaded: bool,
}

pub struct PartnerListLoader {
    rows: Arc<dyn RowStore>,
    table: String,
    state: RwLock<ListState>,
}

impl PartnerListLoader {
    pub fn new(rows: Arc<dyn RowStore>, table: &str) -> Self {
        Self {
            rows,
            table: table.to_string(),
            state: RwLock::new(ListState::default()),
        }
    }

    /// Fetch all partners ordered by creation time, newest first
    pub async fn fetch(&self) -> Result<Vec<PartnerRecord>> {
        let rows = match self
            .rows
            .select(&self.table, None, Some(&OrderBy::desc(columns::CREATED_AT)))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to load partners, keeping previous list: {}", e);
                return Err(AppError::Store(e));
            }
        };

        let partners = records_from_rows(&rows);
        debug!("Loaded {} partners", partners.len());

        let mut state = self.state.write().await;
        state.partners = partners.clone();
        state.loaded = true;
        Ok(partners)
    }

    /// Currently displayed list
    pub async fn partners(&self) -> Vec<PartnerRecord> {
        self.state.read().await.partners.clone()
    }

    /// Whether at least one fetch has succeeded
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    /// Look up a displayed record by id
    pub async fn find(&self, id: i64) -> Option<PartnerRecord> {
        self.state
            .read()
            .await
            .partners
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }
}
