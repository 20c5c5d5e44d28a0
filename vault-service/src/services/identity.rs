//! Primary credentials: login, registration, password reset and
//! government principal provisioning.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::email::EmailProvider;
use super::jwt::{IssuedToken, JwtService};
use super::metrics::record_login;
use super::store::VaultStore;
use super::ServiceError;
use crate::models::{
    AuditAction, AuditDetails, AuditLogEntry, NinBundle, Principal, RegistryMatch, Role,
    TargetKind,
};
use crate::utils::{
    generate_reset_token, hash_password, hash_token, verify_password, Password,
    PasswordHashString,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub struct LoginOutcome {
    pub principal: Principal,
    pub session: IssuedToken,
}

/// Self-registration input. The four corroborating fields are only
/// consulted when `nin` is present.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: Password,
    pub telephone: String,
    pub nin: Option<String>,
    pub surname: Option<String>,
    pub dob: Option<NaiveDate>,
    pub date_of_expiry: Option<NaiveDate>,
    pub personal_id_number: Option<String>,
}

#[derive(Debug)]
pub struct NewGovernmentPrincipal {
    pub email: String,
    pub password: Password,
    pub telephone: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn VaultStore>,
    jwt: Arc<JwtService>,
    email: Arc<dyn EmailProvider>,
    reset_ttl: Duration,
    reset_base_url: String,
}

fn check_password_length(password: &Password) -> Result<(), ServiceError> {
    if password.as_str().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// E.164: a leading `+` then 7 to 15 digits.
fn check_telephone(telephone: &str) -> Result<(), ServiceError> {
    let valid = telephone.strip_prefix('+').is_some_and(|digits| {
        (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
    });
    if !valid {
        return Err(ServiceError::Validation(
            "Telephone must be in E.164 format (+1234567890)".to_string(),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn VaultStore>,
        jwt: Arc<JwtService>,
        email: Arc<dyn EmailProvider>,
        reset_ttl_minutes: i64,
        reset_base_url: &str,
    ) -> Self {
        Self {
            store,
            jwt,
            email,
            reset_ttl: Duration::minutes(reset_ttl_minutes),
            reset_base_url: reset_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn login(
        &self,
        identifier: &str,
        password: &Password,
    ) -> Result<LoginOutcome, ServiceError> {
        let mut candidates = self.store.find_principals_by_identifier(identifier).await?;

        // Zero or several matches are indistinguishable from a bad password.
        if candidates.len() != 1 {
            record_login("failure");
            return Err(ServiceError::InvalidCredentials);
        }
        let principal = candidates.remove(0);

        if verify_password(
            password,
            &PasswordHashString::new(principal.password_hash.clone()),
        )
        .is_err()
        {
            tracing::info!(user_id = %principal.id, "Login rejected");
            record_login("failure");
            return Err(ServiceError::InvalidCredentials);
        }

        let session = self.jwt.issue_session(&principal)?;

        let entry = AuditLogEntry::new(
            Some(principal.id),
            AuditAction::Login,
            Some(principal.id),
            TargetKind::Principal,
            AuditDetails::Login {
                identifier_kind: principal.identifier_kind(identifier).to_string(),
            },
        );
        self.store.append_audit(&entry).await?;

        record_login("success");
        tracing::info!(user_id = %principal.id, role = %principal.role, "Login succeeded");

        Ok(LoginOutcome { principal, session })
    }

    pub async fn register(&self, registration: Registration) -> Result<Principal, ServiceError> {
        let email = registration.email.trim().to_lowercase();
        let telephone = registration.telephone.trim().to_string();
        if email.is_empty() || telephone.is_empty() {
            return Err(ServiceError::Validation(
                "Email and telephone are required".to_string(),
            ));
        }
        check_telephone(&telephone)?;
        check_password_length(&registration.password)?;

        let nin = match non_blank(registration.nin) {
            Some(nin) => {
                let bundle = match (
                    non_blank(registration.surname),
                    registration.dob,
                    registration.date_of_expiry,
                    non_blank(registration.personal_id_number),
                ) {
                    (Some(surname), Some(dob), Some(expiry), Some(pin)) => NinBundle {
                        nin: nin.clone(),
                        surname,
                        date_of_birth: dob,
                        date_of_expiry: expiry,
                        personal_id_number: pin,
                    },
                    _ => {
                        return Err(ServiceError::Validation(
                            "surname, dob, dateOfExpiry and personalIdNumber are required with a national ID"
                                .to_string(),
                        ))
                    }
                };

                let record = self
                    .store
                    .find_registry_record(&nin)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound("National ID not found in registry".to_string())
                    })?;

                if let RegistryMatch::Mismatch(field) = record.check(&bundle) {
                    tracing::info!(field, "Registry corroboration failed");
                    return Err(ServiceError::Validation(
                        "National ID details do not match the registry".to_string(),
                    ));
                }
                Some(nin)
            }
            None => None,
        };

        let password_hash = hash_password(&registration.password)?;
        let with_nin = nin.is_some();
        let (principal, vault) = Principal::new_with_vault(
            email,
            telephone,
            nin,
            password_hash.into_string(),
            Role::Citizen,
            None,
        );

        let entry = AuditLogEntry::new(
            Some(principal.id),
            AuditAction::UserRegistered,
            Some(principal.id),
            TargetKind::Principal,
            AuditDetails::Registered { with_nin },
        );
        self.store.create_principal(&principal, &vault, &entry).await?;

        tracing::info!(user_id = %principal.id, with_nin, "Principal registered");
        Ok(principal)
    }

    /// Always succeeds from the caller's point of view, whether or not a
    /// principal matched and whether or not the store answered.
    pub async fn request_reset(&self, identifier: &str) -> Result<(), ServiceError> {
        let candidates = match self.store.find_principals_by_identifier(identifier).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Password reset lookup failed");
                return Ok(());
            }
        };
        let [principal] = candidates.as_slice() else {
            tracing::info!("Password reset requested for unknown identifier");
            return Ok(());
        };

        let (raw_token, token_hash) = generate_reset_token();
        let expires_at = Utc::now() + self.reset_ttl;

        let entry = AuditLogEntry::new(
            None,
            AuditAction::PasswordResetRequested,
            Some(principal.id),
            TargetKind::Principal,
            AuditDetails::ResetRequested { expires_at },
        );

        if let Err(e) = self
            .store
            .set_reset_token(principal.id, &token_hash, expires_at, &entry)
            .await
        {
            tracing::error!(error = %e, user_id = %principal.id, "Failed to store reset token");
            return Ok(());
        }

        let link = format!("{}/reset-password?token={}", self.reset_base_url, raw_token);
        if let Err(e) = self
            .email
            .send_password_reset_email(&principal.email, &link)
            .await
        {
            tracing::error!(error = %e, user_id = %principal.id, "Failed to send reset email");
        }

        Ok(())
    }

    pub async fn validate_reset(&self, token: &str) -> Result<(), ServiceError> {
        self.store
            .find_principal_by_reset_hash(&hash_token(token), Utc::now())
            .await?
            .map(|_| ())
            .ok_or(ServiceError::InvalidToken)
    }

    pub async fn complete_reset(
        &self,
        token: &str,
        new_password: &Password,
    ) -> Result<(), ServiceError> {
        check_password_length(new_password)?;

        let token_hash = hash_token(token);
        let now = Utc::now();
        let principal = self
            .store
            .find_principal_by_reset_hash(&token_hash, now)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let password_hash = hash_password(new_password)?;
        let entry = AuditLogEntry::new(
            Some(principal.id),
            AuditAction::PasswordReset,
            Some(principal.id),
            TargetKind::Principal,
            AuditDetails::PasswordReset {},
        );

        let consumed = self
            .store
            .consume_reset_token(
                principal.id,
                &token_hash,
                password_hash.as_str(),
                now,
                &entry,
            )
            .await?;
        if !consumed {
            return Err(ServiceError::InvalidToken);
        }

        tracing::info!(user_id = %principal.id, "Password reset completed");
        Ok(())
    }

    pub async fn find_principal(&self, id: Uuid) -> Result<Principal, ServiceError> {
        self.store
            .find_principal_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Principal not found".to_string()))
    }

    pub async fn list_principals(&self, limit: i64) -> Result<Vec<Principal>, ServiceError> {
        Ok(self.store.list_principals(limit.clamp(1, 500)).await?)
    }

    pub async fn create_government_principal(
        &self,
        actor_id: Option<Uuid>,
        input: NewGovernmentPrincipal,
    ) -> Result<Principal, ServiceError> {
        if !input.role.is_government() {
            return Err(ServiceError::Validation(
                "Only government roles can be provisioned".to_string(),
            ));
        }
        check_telephone(input.telephone.trim())?;
        check_password_length(&input.password)?;

        if let Some(org_id) = input.organization_id {
            self.store
                .find_organization(org_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Organization not found".to_string()))?;
        }

        let password_hash = hash_password(&input.password)?;
        let (principal, vault) = Principal::new_with_vault(
            input.email,
            input.telephone,
            None,
            password_hash.into_string(),
            input.role,
            input.organization_id,
        );

        let entry = AuditLogEntry::new(
            actor_id,
            AuditAction::UserCreated,
            Some(principal.id),
            TargetKind::Principal,
            AuditDetails::UserCreated {
                role: principal.role.as_str().to_string(),
                organization_id: principal.organization_id,
            },
        );
        self.store.create_principal(&principal, &vault, &entry).await?;

        tracing::info!(user_id = %principal.id, role = %principal.role, "Government principal created");
        Ok(principal)
    }

    /// Create the first `gov_admin` if no principal owns `email` yet.
    /// Returns whether one was created.
    pub async fn ensure_bootstrap_admin(
        &self,
        email: &str,
        password: Password,
        telephone: &str,
    ) -> Result<bool, ServiceError> {
        if !self
            .store
            .find_principals_by_identifier(email)
            .await?
            .is_empty()
        {
            return Ok(false);
        }

        self.create_government_principal(
            None,
            NewGovernmentPrincipal {
                email: email.to_string(),
                password,
                telephone: telephone.to_string(),
                role: Role::GovAdmin,
                organization_id: None,
            },
        )
        .await?;
        Ok(true)
    }
}
