//! Audit ledger entries: immutable records of security-relevant actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserRegistered,
    UserCreated,
    Login,
    PasswordResetRequested,
    PasswordReset,
    DocumentRequested,
    DocumentUpload,
    DocumentIssued,
    DocumentVerified,
    DocumentDeletedRejected,
    DocumentExpired,
    AccessGranted,
    OrganizationCreated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "USER_REGISTERED",
            AuditAction::UserCreated => "USER_CREATED",
            AuditAction::Login => "LOGIN",
            AuditAction::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            AuditAction::PasswordReset => "PASSWORD_RESET",
            AuditAction::DocumentRequested => "DOCUMENT_REQUESTED",
            AuditAction::DocumentUpload => "DOCUMENT_UPLOAD",
            AuditAction::DocumentIssued => "DOCUMENT_ISSUED",
            AuditAction::DocumentVerified => "DOCUMENT_VERIFIED",
            AuditAction::DocumentDeletedRejected => "DOCUMENT_DELETED_REJECTED",
            AuditAction::DocumentExpired => "DOCUMENT_EXPIRED",
            AuditAction::AccessGranted => "ACCESS_GRANTED",
            AuditAction::OrganizationCreated => "ORGANIZATION_CREATED",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Invalid audit action: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Document,
    Principal,
    Organization,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Document => "document",
            TargetKind::Principal => "principal",
            TargetKind::Organization => "organization",
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(TargetKind::Document),
            "principal" => Ok(TargetKind::Principal),
            "organization" => Ok(TargetKind::Organization),
            _ => Err(format!("Invalid target kind: {}", s)),
        }
    }
}

/// Per-action detail payloads. Stored as a free-form JSON object.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditDetails {
    #[serde(rename_all = "camelCase")]
    Registered { with_nin: bool },
    #[serde(rename_all = "camelCase")]
    UserCreated {
        role: String,
        organization_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    Login { identifier_kind: String },
    #[serde(rename_all = "camelCase")]
    ResetRequested { expires_at: DateTime<Utc> },
    PasswordReset {},
    #[serde(rename_all = "camelCase")]
    DocumentRequested { doc_type: String, title: String },
    #[serde(rename_all = "camelCase")]
    DocumentUpload {
        doc_type: String,
        title: String,
        authenticity_score: Option<f64>,
        scoring_fallback: bool,
    },
    #[serde(rename_all = "camelCase")]
    DocumentIssued {
        doc_type: String,
        title: String,
        owner_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    DocumentVerified {
        decision: String,
        owner_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    DocumentRejected {
        decision: String,
        reason: String,
        original_title: String,
        original_type: String,
    },
    #[serde(rename_all = "camelCase")]
    DocumentExpired {
        previous_status: String,
        expires_at: Option<DateTime<Utc>>,
    },
    AccessGranted { method: String },
    OrganizationCreated { code: String, name: String },
}

impl AuditDetails {
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub target_id: Option<Uuid>,
    pub target_kind: TargetKind,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        actor_id: Option<Uuid>,
        action: AuditAction,
        target_id: Option<Uuid>,
        target_kind: TargetKind,
        details: AuditDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            action,
            target_id,
            target_kind,
            details: details.into_value(),
            created_at: Utc::now(),
        }
    }
}
