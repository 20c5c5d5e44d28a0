use std::sync::Arc;
use uuid::Uuid;

use super::store::{AuditFilter, VaultStore};
use super::ServiceError;
use crate::models::{AuditAction, AuditDetails, AuditLogEntry, TargetKind};

/// Append-only ledger. Entries tied to a state change are written by the
/// store together with that change; this service covers standalone entries
/// and oversight queries.
#[derive(Clone)]
pub struct AuditLedger {
    store: Arc<dyn VaultStore>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn VaultStore>) -> Self {
        Self { store }
    }

    pub async fn append(
        &self,
        actor_id: Option<Uuid>,
        action: AuditAction,
        target_id: Option<Uuid>,
        target_kind: TargetKind,
        details: AuditDetails,
    ) -> Result<AuditLogEntry, ServiceError> {
        let entry = AuditLogEntry::new(actor_id, action, target_id, target_kind, details);
        self.store.append_audit(&entry).await?;
        tracing::debug!(action = entry.action.as_str(), entry_id = %entry.id, "Audit entry appended");
        Ok(entry)
    }

    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, ServiceError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ServiceError::Validation(
                    "'from' must not be after 'to'".to_string(),
                ));
            }
        }
        Ok(self.store.query_audit(filter).await?)
    }
}
