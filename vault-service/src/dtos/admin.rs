use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{AuditAction, Role};
use crate::services::identity::NewGovernmentPrincipal;
use crate::services::organizations::NewOrganization;
use crate::services::AuditFilter;
use crate::utils::Password;

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const DEFAULT_PRINCIPAL_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    #[param(value_type = Option<String>, example = "DOCUMENT_VERIFIED")]
    pub action: Option<AuditAction>,
    /// Inclusive lower bound (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339).
    pub to: Option<DateTime<Utc>>,
    /// Defaults to 100, capped at 500.
    pub limit: Option<i64>,
}

impl From<AuditQuery> for AuditFilter {
    fn from(q: AuditQuery) -> Self {
        AuditFilter {
            actor_id: q.actor_id,
            action: q.action,
            from: q.from,
            to: q.to,
            limit: q.limit.unwrap_or(DEFAULT_AUDIT_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    #[schema(example = "National Civil Registration Authority")]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Organization type is required"))]
    #[schema(example = "registry")]
    pub org_type: String,

    #[validate(length(min = 2, max = 32, message = "Code must be 2 to 32 characters"))]
    #[schema(example = "NCRA")]
    pub code: String,

    #[serde(default = "default_tier")]
    #[validate(range(min = 1, max = 10, message = "Tier must be between 1 and 10"))]
    #[schema(example = 1)]
    pub tier: i32,

    /// Document types this organization may verify or issue. Empty means all.
    #[serde(default)]
    #[schema(example = json!(["Birth Certificate", "Death Certificate"]))]
    pub routing_tags: Vec<String>,
}

fn default_tier() -> i32 {
    1
}

impl From<CreateOrganizationRequest> for NewOrganization {
    fn from(req: CreateOrganizationRequest) -> Self {
        NewOrganization {
            name: req.name,
            org_type: req.org_type,
            code: req.code,
            tier: req.tier,
            routing_tags: req.routing_tags,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "officer@ncra.gov")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 32, message = "Telephone is required"))]
    #[schema(example = "+23276111111")]
    pub telephone: String,

    #[schema(example = "gov_official")]
    pub role: Role,

    pub organization_id: Option<Uuid>,
}

impl From<CreateUserRequest> for NewGovernmentPrincipal {
    fn from(req: CreateUserRequest) -> Self {
        NewGovernmentPrincipal {
            email: req.email,
            password: Password::new(req.password),
            telephone: req.telephone,
            role: req.role,
            organization_id: req.organization_id,
        }
    }
}
