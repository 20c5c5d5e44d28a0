use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::services::lifecycle::{NewRequest, NewUpload, ViewGrant};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Document type is required"))]
    #[schema(example = "Birth Certificate")]
    pub doc_type: String,

    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    #[schema(example = "My birth certificate")]
    pub title: String,

    /// Where the encrypted bytes live. The vault stores the pointer only.
    #[validate(length(min = 1, max = 2048, message = "Content locator is required"))]
    #[schema(example = "s3://vault-docs/3f2c/birth.pdf")]
    pub content_locator: String,

    #[validate(range(min = 0, message = "Size must not be negative"))]
    #[schema(example = 182044)]
    pub size_bytes: i64,

    #[validate(length(min = 1, max = 127, message = "MIME type is required"))]
    #[schema(example = "application/pdf")]
    pub mime_type: String,

    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub content_hash: Option<String>,
}

impl From<UploadDocumentRequest> for NewUpload {
    fn from(req: UploadDocumentRequest) -> Self {
        NewUpload {
            doc_type: req.doc_type,
            title: req.title,
            content_locator: req.content_locator,
            size_bytes: req.size_bytes,
            mime_type: req.mime_type,
            content_hash: req.content_hash,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestDocumentRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Document type is required"))]
    #[schema(example = "Passport")]
    pub doc_type: String,

    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    #[schema(example = "Passport renewal")]
    pub title: String,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl From<RequestDocumentRequest> for NewRequest {
    fn from(req: RequestDocumentRequest) -> Self {
        NewRequest {
            doc_type: req.doc_type,
            title: req.title,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub document_id: Uuid,
    #[schema(example = "s3://vault-docs/3f2c/birth.pdf")]
    pub content_locator: String,
    #[schema(example = "application/pdf")]
    pub mime_type: Option<String>,
}

impl From<ViewGrant> for ViewResponse {
    fn from(grant: ViewGrant) -> Self {
        Self {
            document_id: grant.document_id,
            content_locator: grant.content_locator,
            mime_type: grant.mime_type,
        }
    }
}
