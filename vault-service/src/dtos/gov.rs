use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Decision, Document, DocumentMetadata};
use crate::services::lifecycle::{NewIssuance, VerifyOutcome};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub document_id: Uuid,

    #[schema(example = "APPROVE")]
    pub decision: Decision,

    /// Required when rejecting.
    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters"))]
    #[schema(example = "Seal does not match the issuing authority")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedResponse {
    #[schema(example = true)]
    pub deleted: bool,
    pub document_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum VerifyResponse {
    Verified(Document),
    Deleted(RejectedResponse),
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(outcome: VerifyOutcome) -> Self {
        match outcome {
            VerifyOutcome::Verified(document) => VerifyResponse::Verified(document),
            VerifyOutcome::Rejected(document) => VerifyResponse::Deleted(RejectedResponse {
                deleted: true,
                document_id: document.id,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    /// National ID of the receiving citizen.
    #[validate(length(min = 1, message = "National ID is required"))]
    #[schema(example = "1234567")]
    pub nin: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Document type is required"))]
    #[schema(example = "Birth Certificate")]
    pub doc_type: String,

    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    #[schema(example = "Certified birth certificate")]
    pub title: String,

    #[validate(length(min = 1, max = 2048, message = "Content locator is required"))]
    #[schema(example = "s3://vault-docs/issued/77ab.pdf")]
    pub content_locator: String,

    pub metadata: Option<DocumentMetadata>,

    /// After this instant the admin expiry sweep moves the document to EXPIRED.
    pub valid_until: Option<DateTime<Utc>>,
}

impl From<IssueRequest> for NewIssuance {
    fn from(req: IssueRequest) -> Self {
        NewIssuance {
            nin: req.nin,
            doc_type: req.doc_type,
            title: req.title,
            content_locator: req.content_locator,
            metadata: req.metadata,
            valid_until: req.valid_until,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpireResponse {
    #[schema(example = 3)]
    pub expired: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    #[test]
    fn rejection_renders_as_deletion_marker() {
        let mut document = Document::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Birth Certificate".to_string(),
            "Mine".to_string(),
            DocumentStatus::PendingVerification,
        );
        document.status = DocumentStatus::Rejected;
        let id = document.id;

        let json = serde_json::to_value(VerifyResponse::from(VerifyOutcome::Rejected(document)))
            .unwrap();
        assert_eq!(json, serde_json::json!({ "deleted": true, "documentId": id }));
    }

    #[test]
    fn verify_request_parses_decision() {
        let req: VerifyRequest = serde_json::from_value(serde_json::json!({
            "documentId": Uuid::nil(),
            "decision": "REJECT",
            "reason": "Blurred"
        }))
        .unwrap();
        assert_eq!(req.decision, Decision::Reject);
        assert!(serde_json::from_value::<VerifyRequest>(serde_json::json!({
            "documentId": Uuid::nil(),
            "decision": "MAYBE"
        }))
        .is_err());
    }
}
