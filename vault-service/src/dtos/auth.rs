use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Principal, Role};
use crate::services::identity::Registration;
use crate::utils::Password;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email, telephone or national ID.
    #[validate(length(min = 1, message = "Identifier is required"))]
    #[schema(example = "citizen@example.com")]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "citizen@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 32, message = "Telephone is required"))]
    #[schema(example = "+23276000000")]
    pub telephone: String,

    #[schema(example = "1234567")]
    pub nin: Option<String>,

    #[schema(example = "Kamara")]
    pub surname: Option<String>,

    #[schema(example = "1990-01-01")]
    pub dob: Option<NaiveDate>,

    #[schema(example = "2030-01-01")]
    pub date_of_expiry: Option<NaiveDate>,

    #[schema(example = "A1")]
    pub personal_id_number: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            email: req.email,
            password: Password::new(req.password),
            telephone: req.telephone,
            nin: req.nin,
            surname: req.surname,
            dob: req.dob,
            date_of_expiry: req.date_of_expiry,
            personal_id_number: req.personal_id_number,
        }
    }
}

/// What the API reveals about a principal. Never carries credentials.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: Uuid,
    #[schema(example = "citizen@example.com")]
    pub email: String,
    pub telephone: String,
    pub role: Role,
    pub vault_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub national_id_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalSummary {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.email.clone(),
            telephone: p.telephone.clone(),
            role: p.role,
            vault_id: p.vault_id,
            organization_id: p.organization_id,
            national_id_linked: p.nin.is_some(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub principal: PrincipalSummary,
    /// Seconds until the session cookie expires.
    #[schema(example = 604800)]
    pub expires_in: i64,
    #[schema(example = "/dashboard")]
    pub redirect_to: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestResetRequest {
    #[validate(length(min = 1, message = "Identifier is required"))]
    #[schema(example = "citizen@example.com")]
    pub identifier: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetValidateRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    #[schema(example = "a1b2c3d4e5f6...")]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetValidateResponse {
    #[schema(example = true)]
    pub valid: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    #[schema(example = "a1b2c3d4e5f6...")]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "newpassword123", min_length = 8)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StepUpRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepUpResponse {
    pub token: String,
    #[schema(example = 300)]
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_reads_camel_case_dates() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@example.com",
            "password": "password123",
            "telephone": "+1555",
            "nin": "1234567",
            "surname": "Kamara",
            "dob": "1990-01-01",
            "dateOfExpiry": "2030-01-01",
            "personalIdNumber": "A1"
        }))
        .unwrap();

        assert!(req.validate().is_ok());
        assert_eq!(req.date_of_expiry, NaiveDate::from_ymd_opt(2030, 1, 1));
        let registration = Registration::from(req);
        assert_eq!(registration.personal_id_number.as_deref(), Some("A1"));
    }

    #[test]
    fn short_password_fails_validation() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@example.com",
            "password": "short",
            "telephone": "+1555"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn summary_hides_credentials() {
        let (principal, _) = Principal::new_with_vault(
            "a@example.com".to_string(),
            "+1555".to_string(),
            Some("1234567".to_string()),
            "$argon2id$secret".to_string(),
            Role::Citizen,
            None,
        );
        let json = serde_json::to_value(PrincipalSummary::from(&principal)).unwrap();

        assert_eq!(json["role"], "citizen");
        assert_eq!(json["nationalIdLinked"], true);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("nin").is_none());
    }
}
