//! Sync domain service: incremental workshop listings for client caches.
//!
//! Clients keep a cursor (the highest `last_modified` they have seen) and ask
//! for everything changed after it. Archived workshops are included so the
//! client can drop them; see `workshop_core::reconcile`.

use std::sync::Arc;

use crate::service::operation::{service_names, Operation, OperationError, OperationResponse};
use crate::traits::WorkshopStore;

pub struct SyncService {
    store: Arc<dyn WorkshopStore>,
}

domain_service!(SyncService, service_names::SYNC);

impl SyncService {
    #[must_use]
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    async fn handle(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        let Operation::ChangesSince { since, .. } = op else {
            return Err(OperationError::WrongService);
        };
        let workshops = self.store.workshops_modified_since(since).await?;
        let cursor = workshops
            .iter()
            .map(|w| w.last_modified)
            .max()
            .unwrap_or(since);
        tracing::debug!(since, cursor, changed = workshops.len(), "changes served");
        Ok(OperationResponse::Changes { workshops, cursor })
    }
}
