use std::sync::Arc;
use uuid::Uuid;

use super::store::VaultStore;
use super::ServiceError;
use crate::models::{AuditAction, AuditDetails, AuditLogEntry, Organization, TargetKind};

#[derive(Debug)]
pub struct NewOrganization {
    pub name: String,
    pub org_type: String,
    pub code: String,
    pub tier: i32,
    pub routing_tags: Vec<String>,
}

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn VaultStore>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn VaultStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        actor_id: Uuid,
        input: NewOrganization,
    ) -> Result<Organization, ServiceError> {
        if input.name.trim().is_empty() || input.code.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Organization name and code are required".to_string(),
            ));
        }

        let organization = Organization::new(
            input.name,
            input.org_type,
            input.code,
            input.tier,
            input.routing_tags,
        );
        let entry = AuditLogEntry::new(
            Some(actor_id),
            AuditAction::OrganizationCreated,
            Some(organization.id),
            TargetKind::Organization,
            AuditDetails::OrganizationCreated {
                code: organization.code.clone(),
                name: organization.name.clone(),
            },
        );
        self.store.create_organization(&organization, &entry).await?;

        tracing::info!(organization_id = %organization.id, code = %organization.code, "Organization created");
        Ok(organization)
    }

    pub async fn list(&self) -> Result<Vec<Organization>, ServiceError> {
        Ok(self.store.list_organizations().await?)
    }
}
