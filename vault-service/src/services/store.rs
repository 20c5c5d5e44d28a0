//! Durable store abstraction. Every mutation that must be audited takes its
//! ledger entry and persists both in one unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AuditAction, AuditLogEntry, Document, DocumentStatus, Organization, Principal, RegistryRecord,
    Vault,
};

pub const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Map a violated unique constraint to the message shown to callers.
pub fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("principals_email_key") => "Email is already registered".to_string(),
        Some("principals_telephone_key") => "Telephone is already registered".to_string(),
        Some("principals_nin_key") => {
            "National ID is already associated with another account".to_string()
        }
        Some("principal_identifiers_pkey") => {
            "Identifier is already in use by another account".to_string()
        }
        Some("organizations_code_key") => "Organization code already exists".to_string(),
        _ => "Resource already exists".to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor_id.map_or(true, |id| entry.actor_id == Some(id))
            && self.action.map_or(true, |action| entry.action == action)
            && self.from.map_or(true, |from| entry.created_at >= from)
            && self.to.map_or(true, |to| entry.created_at <= to)
    }

    pub fn bounded_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_AUDIT_LIMIT)
    }
}

#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Principals

    /// Insert a principal, its vault and the creation entry atomically.
    async fn create_principal(
        &self,
        principal: &Principal,
        vault: &Vault,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError>;
    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;
    /// All principals whose email (case-insensitive), telephone or
    /// national-id equals `identifier`.
    async fn find_principals_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<Principal>, StoreError>;
    async fn find_principal_by_nin(&self, nin: &str) -> Result<Option<Principal>, StoreError>;
    async fn list_principals(&self, limit: i64) -> Result<Vec<Principal>, StoreError>;

    // Password reset

    async fn set_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError>;
    async fn find_principal_by_reset_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Principal>, StoreError>;
    /// Replace the password only if the token is still present and unexpired.
    /// Returns `false` when another request consumed it first.
    async fn consume_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError>;

    // Reference data

    async fn find_registry_record(&self, nin: &str) -> Result<Option<RegistryRecord>, StoreError>;
    async fn create_organization(
        &self,
        organization: &Organization,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError>;
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, StoreError>;
    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError>;

    // Documents

    async fn insert_document(
        &self,
        document: &Document,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError>;
    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, StoreError>;
    async fn list_documents_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>, StoreError>;
    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, StoreError>;
    async fn list_lapsed_documents(&self, now: DateTime<Utc>)
        -> Result<Vec<Document>, StoreError>;
    /// Write `updated` only if the stored status still equals `expected`.
    async fn transition_document(
        &self,
        updated: &Document,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError>;
    /// Delete only if the stored status still equals `expected`.
    async fn delete_document(
        &self,
        id: Uuid,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError>;

    // Ledger

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
    /// Newest first, at most `filter.bounded_limit()` entries.
    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditDetails, TargetKind};

    #[test]
    fn limit_is_bounded() {
        let filter = AuditFilter {
            limit: 10_000,
            ..Default::default()
        };
        assert_eq!(filter.bounded_limit(), MAX_AUDIT_LIMIT);
        assert_eq!(AuditFilter::default().bounded_limit(), 1);
    }

    #[test]
    fn filter_matches_actor_and_action() {
        let actor = Uuid::new_v4();
        let entry = AuditLogEntry::new(
            Some(actor),
            AuditAction::Login,
            Some(actor),
            TargetKind::Principal,
            AuditDetails::Login {
                identifier_kind: "email".into(),
            },
        );

        let filter = AuditFilter {
            actor_id: Some(actor),
            action: Some(AuditAction::Login),
            ..Default::default()
        };
        assert!(filter.matches(&entry));

        let other = AuditFilter {
            action: Some(AuditAction::PasswordReset),
            ..Default::default()
        };
        assert!(!other.matches(&entry));
    }

    #[test]
    fn nin_conflict_message() {
        assert_eq!(
            conflict_message(Some("principals_nin_key")),
            "National ID is already associated with another account"
        );
    }
}
