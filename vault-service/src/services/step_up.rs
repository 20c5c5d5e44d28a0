use std::sync::Arc;
use uuid::Uuid;

use super::jwt::{IssuedToken, JwtService};
use super::store::VaultStore;
use super::ServiceError;
use crate::models::Principal;
use crate::utils::{verify_password, Password, PasswordHashString};

/// Re-verifies the password of an already authenticated principal and
/// issues a short-lived `document_access` token. Failures leave no trace
/// in the store.
#[derive(Clone)]
pub struct StepUpService {
    store: Arc<dyn VaultStore>,
    jwt: Arc<JwtService>,
}

impl StepUpService {
    pub fn new(store: Arc<dyn VaultStore>, jwt: Arc<JwtService>) -> Self {
        Self { store, jwt }
    }

    pub async fn step_up(
        &self,
        principal_id: Uuid,
        password: &Password,
    ) -> Result<IssuedToken, ServiceError> {
        let principal: Principal = self
            .store
            .find_principal_by_id(principal_id)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            password,
            &PasswordHashString::new(principal.password_hash.clone()),
        )
        .map_err(|_| {
            tracing::warn!(user_id = %principal_id, "Step-up rejected");
            ServiceError::InvalidCredentials
        })?;

        let issued = self.jwt.issue_step_up(principal.id, principal.role)?;
        tracing::info!(user_id = %principal_id, "Step-up token issued");
        Ok(issued)
    }
}
