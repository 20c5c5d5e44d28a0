//! In-process store used for local development and tests. All uniqueness
//! checks and conditional writes happen under a single lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{AuditFilter, StoreError, VaultStore};
use crate::models::{
    normalize_identifier, AuditLogEntry, Document, DocumentStatus, Organization, Principal,
    RegistryRecord, Vault,
};

#[derive(Default)]
struct MemoryState {
    principals: HashMap<Uuid, Principal>,
    vaults: HashMap<Uuid, Vault>,
    registry: HashMap<String, RegistryRecord>,
    organizations: HashMap<Uuid, Organization>,
    documents: HashMap<Uuid, Document>,
    audit: Vec<AuditLogEntry>,
}

impl MemoryState {
    fn principal_conflict(&self, candidate: &Principal) -> Option<&'static str> {
        let same_kind = self.principals.values().find_map(|existing| {
            if existing.email == candidate.email {
                Some("principals_email_key")
            } else if existing.telephone == candidate.telephone {
                Some("principals_telephone_key")
            } else if candidate.nin.is_some() && existing.nin == candidate.nin {
                Some("principals_nin_key")
            } else {
                None
            }
        });
        if same_kind.is_some() {
            return same_kind;
        }

        let claimed: Vec<String> = candidate
            .login_identifiers()
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        self.principals
            .values()
            .flat_map(Principal::login_identifiers)
            .any(|(_, value)| claimed.contains(&value))
            .then_some("principal_identifiers_pkey")
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Seed a national-identity registry record.
    pub fn insert_registry_record(&self, record: RegistryRecord) -> Result<(), StoreError> {
        self.state()?.registry.insert(record.nin.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Poison the lock so every later call reports the store unavailable.
    pub(crate) fn poison(&self) {
        let state = Arc::clone(&self.state);
        let _ = std::thread::spawn(move || {
            let _guard = state.lock();
            panic!("memory store poisoned for test");
        })
        .join();
    }
}

fn newest_first<T: Clone>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl VaultStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.state().map(|_| ())
    }

    async fn create_principal(
        &self,
        principal: &Principal,
        vault: &Vault,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if let Some(constraint) = state.principal_conflict(principal) {
            return Err(StoreError::Conflict(super::store::conflict_message(Some(
                constraint,
            ))));
        }
        state.principals.insert(principal.id, principal.clone());
        state.vaults.insert(vault.id, vault.clone());
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.state()?.principals.get(&id).cloned())
    }

    async fn find_principals_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<Principal>, StoreError> {
        let identifier = normalize_identifier(identifier);
        Ok(self
            .state()?
            .principals
            .values()
            .filter(|p| {
                p.login_identifiers()
                    .iter()
                    .any(|(_, value)| *value == identifier)
            })
            .cloned()
            .collect())
    }

    async fn find_principal_by_nin(&self, nin: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .state()?
            .principals
            .values()
            .find(|p| p.nin.as_deref() == Some(nin))
            .cloned())
    }

    async fn list_principals(&self, limit: i64) -> Result<Vec<Principal>, StoreError> {
        let all: Vec<Principal> = self.state()?.principals.values().cloned().collect();
        let mut sorted = newest_first(all, |p| p.created_at);
        sorted.truncate(limit.max(0) as usize);
        Ok(sorted)
    }

    async fn set_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let principal = state
            .principals
            .get_mut(&principal_id)
            .ok_or_else(|| StoreError::Database(anyhow::anyhow!("principal vanished")))?;
        principal.reset_token_hash = Some(token_hash.to_string());
        principal.reset_token_expires_at = Some(expires_at);
        principal.updated_at = Utc::now();
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn find_principal_by_reset_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .state()?
            .principals
            .values()
            .find(|p| p.has_live_reset_token(token_hash, now))
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        principal_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let Some(principal) = state.principals.get_mut(&principal_id) else {
            return Ok(false);
        };
        if !principal.has_live_reset_token(token_hash, now) {
            return Ok(false);
        }
        principal.password_hash = new_password_hash.to_string();
        principal.reset_token_hash = None;
        principal.reset_token_expires_at = None;
        principal.updated_at = now;
        state.audit.push(entry.clone());
        Ok(true)
    }

    async fn find_registry_record(&self, nin: &str) -> Result<Option<RegistryRecord>, StoreError> {
        Ok(self.state()?.registry.get(nin).cloned())
    }

    async fn create_organization(
        &self,
        organization: &Organization,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state
            .organizations
            .values()
            .any(|o| o.code == organization.code)
        {
            return Err(StoreError::Conflict(super::store::conflict_message(Some(
                "organizations_code_key",
            ))));
        }
        state
            .organizations
            .insert(organization.id, organization.clone());
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        Ok(self.state()?.organizations.get(&id).cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        let all: Vec<Organization> = self.state()?.organizations.values().cloned().collect();
        Ok(newest_first(all, |o| o.created_at))
    }

    async fn insert_document(
        &self,
        document: &Document,
        entry: &AuditLogEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(super::store::conflict_message(Some(
                "documents_pkey",
            ))));
        }
        state.documents.insert(document.id, document.clone());
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.state()?.documents.get(&id).cloned())
    }

    async fn list_documents_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let owned: Vec<Document> = self
            .state()?
            .documents
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(owned, |d| d.created_at))
    }

    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, StoreError> {
        let mut matching: Vec<Document> = self
            .state()?
            .documents
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|d| d.created_at);
        Ok(matching)
    }

    async fn list_lapsed_documents(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .state()?
            .documents
            .values()
            .filter(|d| d.is_lapsed(now))
            .cloned()
            .collect())
    }

    async fn transition_document(
        &self,
        updated: &Document,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.documents.get_mut(&updated.id) {
            Some(current) if current.status == expected => {
                *current = updated.clone();
                state.audit.push(entry.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_document(
        &self,
        id: Uuid,
        expected: DocumentStatus,
        entry: &AuditLogEntry,
    ) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let matches = state
            .documents
            .get(&id)
            .is_some_and(|current| current.status == expected);
        if !matches {
            return Ok(false);
        }
        state.documents.remove(&id);
        state.audit.push(entry.clone());
        Ok(true)
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.state()?.audit.push(entry.clone());
        Ok(())
    }

    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, StoreError> {
        let state = self.state()?;
        // Appended in time order, so reverse iteration is newest first.
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .take(filter.bounded_limit() as usize)
            .cloned()
            .collect())
    }
}
