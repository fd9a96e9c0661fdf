//! Deletion confirmer
//!
//! Two-step guard in front of the destructive delete call:
//!
//! ```text
//! Idle --request--> PendingConfirmation(record)
//! PendingConfirmation --cancel--> Idle          (no calls)
//! PendingConfirmation --confirm--> Idle         (one delete by id)
//! ```
//!
//! A failed delete leaves the confirmation pending so it can be retried or
//! cancelled.

use crate::error::{AppError, Result};
use pl_common::backend::{Filter, RowStore};
use pl_common::PartnerRecord;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionState {
    Idle,
    PendingConfirmation { partner: PartnerRecord },
}

pub struct DeletionConfirmer {
    rows: Arc<dyn RowStore>,
    table: String,
    state: Mutex<DeletionState>,
}

impl DeletionConfirmer {
    pub fn new(rows: Arc<dyn RowStore>, table: &str) -> Self {
        Self {
            rows,
            table: table.to_string(),
            state: Mutex::new(DeletionState::Idle),
        }
    }

    /// Enter PendingConfirmation for `partner`; never deletes
    ///
    /// A second request replaces the pending record.
    pub async fn request(&self, partner: PartnerRecord) {
        *self.state.lock().await = DeletionState::PendingConfirmation { partner };
    }

    /// Return to Idle; true if a confirmation was pending
    pub async fn cancel(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock().await, DeletionState::Idle);
        matches!(previous, DeletionState::PendingConfirmation { .. })
    }

    /// Issue the delete for the pending record
    ///
    /// Returns the deleted record. The caller refreshes the list.
    pub async fn confirm(&self) -> Result<PartnerRecord> {
        let mut state = self.state.lock().await;
        let partner = match &*state {
            DeletionState::Idle => {
                return Err(AppError::InvalidState(
                    "No deletion awaiting confirmation".to_string(),
                ))
            }
            DeletionState::PendingConfirmation { partner } => partner.clone(),
        };

        if let Err(e) = self.rows.delete(&self.table, &Filter::by_id(partner.id)).await {
            warn!(partner_id = partner.id, "Delete failed, confirmation still pending: {}", e);
            return Err(AppError::Store(e));
        }

        *state = DeletionState::Idle;
        info!(partner_id = partner.id, "Deleted partner");
        Ok(partner)
    }

    pub async fn state(&self) -> DeletionState {
        self.state.lock().await.clone()
    }
}
