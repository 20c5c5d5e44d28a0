use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Requested,
    PendingVerification,
    Verified,
    Issued,
    /// Never persisted: a rejected document is deleted and only the
    /// response snapshot carries this status.
    Rejected,
    Expired,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Requested => "REQUESTED",
            DocumentStatus::PendingVerification => "PENDING_VERIFICATION",
            DocumentStatus::Verified => "VERIFIED",
            DocumentStatus::Issued => "ISSUED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Expired => "EXPIRED",
        }
    }

    /// Only a pending document can receive a verification decision.
    pub fn accepts_decision(&self) -> bool {
        matches!(self, DocumentStatus::PendingVerification)
    }

    pub fn can_expire(&self) -> bool {
        matches!(self, DocumentStatus::Issued | DocumentStatus::Verified)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(DocumentStatus::Requested),
            "PENDING_VERIFICATION" => Ok(DocumentStatus::PendingVerification),
            "VERIFIED" => Ok(DocumentStatus::Verified),
            "ISSUED" => Ok(DocumentStatus::Issued),
            "REJECTED" => Ok(DocumentStatus::Rejected),
            "EXPIRED" => Ok(DocumentStatus::Expired),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub authenticity_score: Option<f64>,
    #[serde(default)]
    pub flags: Vec<String>,
    pub explanation: Option<String>,
    pub content_hash: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GovAudit {
    pub uploaded_by: Option<Uuid>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub vault_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub title: String,
    pub notes: Option<String>,
    pub content_locator: Option<String>,
    pub status: DocumentStatus,
    pub metadata: DocumentMetadata,
    pub gov_audit: GovAudit,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        owner_id: Uuid,
        vault_id: Uuid,
        doc_type: String,
        title: String,
        status: DocumentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            vault_id,
            doc_type,
            title,
            notes: None,
            content_locator: None,
            status,
            metadata: DocumentMetadata::default(),
            gov_audit: GovAudit::default(),
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_content(&self) -> bool {
        self.content_locator
            .as_deref()
            .is_some_and(|locator| !locator.trim().is_empty())
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status.can_expire() && self.expires_at.is_some_and(|at| at <= now)
    }
}
