//! Principals (platform users) and their one-to-one vaults.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::Role;

/// A platform user. Credential material never leaves the service layer;
/// API responses go through `PrincipalSummary`.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub telephone: String,
    pub nin: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    pub vault_id: Uuid,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Logical container of a principal's documents.
#[derive(Debug, Clone)]
pub struct Vault {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Login identifiers are compared trimmed and case-folded, across all kinds.
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

impl Principal {
    /// Build a principal and its vault with both ids allocated up front, so
    /// the pair can be written in one unit of work despite referencing
    /// each other.
    pub fn new_with_vault(
        email: String,
        telephone: String,
        nin: Option<String>,
        password_hash: String,
        role: Role,
        organization_id: Option<Uuid>,
    ) -> (Self, Vault) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let vault_id = Uuid::new_v4();

        let principal = Self {
            id,
            email: email.trim().to_lowercase(),
            telephone: telephone.trim().to_string(),
            nin,
            password_hash,
            role,
            organization_id,
            vault_id,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let vault = Vault {
            id: vault_id,
            owner_id: id,
            created_at: now,
        };
        (principal, vault)
    }

    /// Every value this principal can log in with, as `(kind, value)`.
    /// No two principals may share a value, whatever its kind.
    pub fn login_identifiers(&self) -> Vec<(&'static str, String)> {
        let mut identifiers = vec![
            ("email", normalize_identifier(&self.email)),
            ("telephone", normalize_identifier(&self.telephone)),
        ];
        if let Some(nin) = &self.nin {
            identifiers.push(("nin", normalize_identifier(nin)));
        }
        let mut seen = HashSet::new();
        identifiers.retain(|(_, value)| seen.insert(value.clone()));
        identifiers
    }

    /// Which login identifier `identifier` refers to for this principal.
    pub fn identifier_kind(&self, identifier: &str) -> &'static str {
        let identifier = identifier.trim();
        if self.email.eq_ignore_ascii_case(identifier) {
            "email"
        } else if self.nin.as_deref() == Some(identifier) {
            "nin"
        } else {
            "telephone"
        }
    }

    pub fn has_live_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        self.reset_token_hash.as_deref() == Some(token_hash)
            && self.reset_token_expires_at.is_some_and(|exp| exp > now)
    }
}
