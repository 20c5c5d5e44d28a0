//! Document lifecycle. Each transition reads a snapshot, checks its
//! preconditions, then writes conditioned on the snapshot's status so that
//! concurrent decisions resolve to exactly one winner.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::audit::AuditLedger;
use super::jwt::{SessionClaims, StepUpClaims};
use super::metrics::record_transition;
use super::rbac::permits_document_type;
use super::scoring::{score_with_fallback, AuthenticityScorer, ScoreRequest};
use super::store::VaultStore;
use super::ServiceError;
use crate::models::{
    AuditAction, AuditDetails, AuditLogEntry, Decision, Document, DocumentMetadata,
    DocumentStatus, Role, TargetKind,
};

#[derive(Debug)]
pub struct NewRequest {
    pub doc_type: String,
    pub title: String,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct NewUpload {
    pub doc_type: String,
    pub title: String,
    pub content_locator: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub content_hash: Option<String>,
}

#[derive(Debug)]
pub struct NewIssuance {
    pub nin: String,
    pub doc_type: String,
    pub title: String,
    pub content_locator: String,
    pub metadata: Option<DocumentMetadata>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum VerifyOutcome {
    Verified(Document),
    /// The row is gone; this is the last snapshot, marked `REJECTED`.
    Rejected(Document),
}

#[derive(Debug)]
pub struct ViewGrant {
    pub document_id: Uuid,
    pub content_locator: String,
    pub mime_type: Option<String>,
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn VaultStore>,
    ledger: AuditLedger,
    scorer: Arc<dyn AuthenticityScorer>,
    scoring_timeout: Duration,
}

fn required(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn VaultStore>,
        ledger: AuditLedger,
        scorer: Arc<dyn AuthenticityScorer>,
        scoring_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            scorer,
            scoring_timeout,
        }
    }

    /// Government principals whose organization carries routing tags may only
    /// act on matching document types.
    async fn ensure_scope(&self, actor: &SessionClaims, doc_type: &str) -> Result<(), ServiceError> {
        if actor.role == Role::GovAdmin {
            return Ok(());
        }
        let principal = self
            .store
            .find_principal_by_id(actor.sub)
            .await?
            .ok_or_else(|| ServiceError::Forbidden("Unknown principal".to_string()))?;

        let organization = match principal.organization_id {
            Some(org_id) => self.store.find_organization(org_id).await?,
            None => None,
        };

        if permits_document_type(principal.role, organization.as_ref(), doc_type) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Your organization does not handle '{}' documents",
                doc_type
            )))
        }
    }

    pub async fn request(
        &self,
        actor: &SessionClaims,
        input: NewRequest,
    ) -> Result<Document, ServiceError> {
        let mut document = Document::new(
            actor.sub,
            actor.vault_id,
            required(&input.doc_type, "type")?,
            required(&input.title, "title")?,
            DocumentStatus::Requested,
        );
        document.notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let entry = AuditLogEntry::new(
            Some(actor.sub),
            AuditAction::DocumentRequested,
            Some(document.id),
            TargetKind::Document,
            AuditDetails::DocumentRequested {
                doc_type: document.doc_type.clone(),
                title: document.title.clone(),
            },
        );
        self.store.insert_document(&document, &entry).await?;

        record_transition(DocumentStatus::Requested);
        tracing::info!(document_id = %document.id, user_id = %actor.sub, "Document requested");
        Ok(document)
    }

    pub async fn upload(
        &self,
        actor: &SessionClaims,
        input: NewUpload,
    ) -> Result<Document, ServiceError> {
        let doc_type = required(&input.doc_type, "type")?;
        let title = required(&input.title, "title")?;
        let content_locator = required(&input.content_locator, "contentLocator")?;
        if input.size_bytes < 0 {
            return Err(ServiceError::Validation(
                "sizeBytes must not be negative".to_string(),
            ));
        }

        let request = ScoreRequest {
            doc_type: doc_type.clone(),
            title: title.clone(),
            content_locator: content_locator.clone(),
            mime_type: input.mime_type.clone(),
            size_bytes: input.size_bytes,
            content_hash: input.content_hash.clone(),
        };
        let outcome =
            score_with_fallback(self.scorer.as_ref(), &request, self.scoring_timeout).await;

        let mut document = Document::new(
            actor.sub,
            actor.vault_id,
            doc_type,
            title,
            DocumentStatus::PendingVerification,
        );
        document.content_locator = Some(content_locator);
        document.metadata.mime_type = Some(input.mime_type);
        document.metadata.size_bytes = Some(input.size_bytes);
        document.metadata.content_hash = input.content_hash;
        outcome.result.apply_to(&mut document.metadata);

        let entry = AuditLogEntry::new(
            Some(actor.sub),
            AuditAction::DocumentUpload,
            Some(document.id),
            TargetKind::Document,
            AuditDetails::DocumentUpload {
                doc_type: document.doc_type.clone(),
                title: document.title.clone(),
                authenticity_score: document.metadata.authenticity_score,
                scoring_fallback: outcome.fallback,
            },
        );
        self.store.insert_document(&document, &entry).await?;

        record_transition(DocumentStatus::PendingVerification);
        tracing::info!(
            document_id = %document.id,
            user_id = %actor.sub,
            score = outcome.result.score,
            "Document uploaded"
        );
        Ok(document)
    }

    pub async fn issue(
        &self,
        actor: &SessionClaims,
        input: NewIssuance,
    ) -> Result<Document, ServiceError> {
        let doc_type = required(&input.doc_type, "type")?;
        let title = required(&input.title, "title")?;
        let content_locator = required(&input.content_locator, "contentLocator")?;
        let now = Utc::now();
        if input.valid_until.is_some_and(|until| until <= now) {
            return Err(ServiceError::Validation(
                "validUntil must be in the future".to_string(),
            ));
        }

        self.ensure_scope(actor, &doc_type).await?;

        let owner = self
            .store
            .find_principal_by_nin(input.nin.trim())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("No principal matches the national ID".to_string())
            })?;

        let mut document = Document::new(
            owner.id,
            owner.vault_id,
            doc_type,
            title,
            DocumentStatus::Issued,
        );
        document.content_locator = Some(content_locator);
        document.metadata = input.metadata.unwrap_or_default();
        document.gov_audit.uploaded_by = Some(actor.sub);
        document.gov_audit.issued_at = Some(now);
        document.expires_at = input.valid_until;

        let entry = AuditLogEntry::new(
            Some(actor.sub),
            AuditAction::DocumentIssued,
            Some(document.id),
            TargetKind::Document,
            AuditDetails::DocumentIssued {
                doc_type: document.doc_type.clone(),
                title: document.title.clone(),
                owner_id: owner.id,
            },
        );
        self.store.insert_document(&document, &entry).await?;

        record_transition(DocumentStatus::Issued);
        tracing::info!(document_id = %document.id, officer_id = %actor.sub, "Document issued");
        Ok(document)
    }

    pub async fn verify(
        &self,
        actor: &SessionClaims,
        document_id: Uuid,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<VerifyOutcome, ServiceError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if decision == Decision::Reject && reason.is_none() {
            return Err(ServiceError::Validation(
                "A reason is required to reject a document".to_string(),
            ));
        }

        let snapshot = self
            .store
            .find_document(document_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))?;

        self.ensure_scope(actor, &snapshot.doc_type).await?;

        if !snapshot.status.accepts_decision() {
            return Err(ServiceError::Conflict(format!(
                "Document is {} and cannot be verified",
                snapshot.status
            )));
        }

        let now = Utc::now();
        let lost_race =
            || ServiceError::Conflict("Document was already processed".to_string());

        match (decision, reason) {
            (Decision::Approve, _) => {
                let mut updated = snapshot.clone();
                updated.status = DocumentStatus::Verified;
                updated.gov_audit.verified_by = Some(actor.sub);
                updated.gov_audit.verified_at = Some(now);
                updated.updated_at = now;

                let entry = AuditLogEntry::new(
                    Some(actor.sub),
                    AuditAction::DocumentVerified,
                    Some(updated.id),
                    TargetKind::Document,
                    AuditDetails::DocumentVerified {
                        decision: decision.as_str().to_string(),
                        owner_id: updated.owner_id,
                    },
                );

                if !self
                    .store
                    .transition_document(&updated, snapshot.status, &entry)
                    .await?
                {
                    return Err(lost_race());
                }

                record_transition(DocumentStatus::Verified);
                tracing::info!(document_id = %updated.id, officer_id = %actor.sub, "Document verified");
                Ok(VerifyOutcome::Verified(updated))
            }
            (Decision::Reject, Some(reason)) => {
                let entry = AuditLogEntry::new(
                    Some(actor.sub),
                    AuditAction::DocumentDeletedRejected,
                    Some(snapshot.id),
                    TargetKind::Document,
                    AuditDetails::DocumentRejected {
                        decision: decision.as_str().to_string(),
                        reason: reason.clone(),
                        original_title: snapshot.title.clone(),
                        original_type: snapshot.doc_type.clone(),
                    },
                );

                if !self
                    .store
                    .delete_document(snapshot.id, snapshot.status, &entry)
                    .await?
                {
                    return Err(lost_race());
                }

                let mut rejected = snapshot;
                rejected.status = DocumentStatus::Rejected;
                rejected.gov_audit.rejected_by = Some(actor.sub);
                rejected.gov_audit.rejection_reason = Some(reason);
                rejected.gov_audit.rejected_at = Some(now);
                rejected.updated_at = now;

                record_transition(DocumentStatus::Rejected);
                tracing::info!(document_id = %rejected.id, officer_id = %actor.sub, "Document rejected and deleted");
                Ok(VerifyOutcome::Rejected(rejected))
            }
            (Decision::Reject, None) => Err(ServiceError::Validation(
                "A reason is required to reject a document".to_string(),
            )),
        }
    }

    /// Raw-content access. Citizens may only open their own documents and
    /// learn nothing about others'.
    pub async fn view(
        &self,
        grant: &StepUpClaims,
        document_id: Uuid,
    ) -> Result<ViewGrant, ServiceError> {
        let document = self.store.find_document(document_id).await?;

        let document = match (grant.role, document) {
            (Role::Citizen, Some(doc)) if doc.owner_id == grant.sub => doc,
            (Role::Citizen, _) => {
                return Err(ServiceError::Forbidden(
                    "You do not have access to this document".to_string(),
                ))
            }
            (_, Some(doc)) => doc,
            (_, None) => return Err(ServiceError::NotFound("Document not found".to_string())),
        };

        let content_locator = match (&document.content_locator, document.has_content()) {
            (Some(locator), true) => locator.clone(),
            _ => {
                return Err(ServiceError::NotFound(
                    "Document has no content".to_string(),
                ))
            }
        };

        self.ledger
            .append(
                Some(grant.sub),
                AuditAction::AccessGranted,
                Some(document.id),
                TargetKind::Document,
                AuditDetails::AccessGranted {
                    method: "step-up".to_string(),
                },
            )
            .await?;

        tracing::info!(document_id = %document.id, user_id = %grant.sub, "Document content accessed");
        Ok(ViewGrant {
            document_id: document.id,
            content_locator,
            mime_type: document.metadata.mime_type,
        })
    }

    pub async fn list_own(&self, actor: &SessionClaims) -> Result<Vec<Document>, ServiceError> {
        Ok(self.store.list_documents_by_owner(actor.sub).await?)
    }

    pub async fn list_pending(&self) -> Result<Vec<Document>, ServiceError> {
        Ok(self
            .store
            .list_documents_by_status(DocumentStatus::PendingVerification)
            .await?)
    }

    /// Move every ISSUED or VERIFIED document past its `expires_at` to
    /// EXPIRED. Documents changed concurrently are skipped.
    pub async fn expire_lapsed(&self, actor: &SessionClaims) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let lapsed = self.store.list_lapsed_documents(now).await?;
        let mut expired = 0;

        for document in lapsed {
            let previous = document.status;
            let mut updated = document;
            updated.status = DocumentStatus::Expired;
            updated.updated_at = now;

            let entry = AuditLogEntry::new(
                Some(actor.sub),
                AuditAction::DocumentExpired,
                Some(updated.id),
                TargetKind::Document,
                AuditDetails::DocumentExpired {
                    previous_status: previous.as_str().to_string(),
                    expires_at: updated.expires_at,
                },
            );

            if self
                .store
                .transition_document(&updated, previous, &entry)
                .await?
            {
                record_transition(DocumentStatus::Expired);
                expired += 1;
            } else {
                tracing::debug!(document_id = %updated.id, "Skipped expiry of concurrently changed document");
            }
        }

        tracing::info!(expired, officer_id = %actor.sub, "Expiry sweep finished");
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Organization, Principal};
    use crate::services::scoring::HeuristicScorer;
    use crate::services::store::AuditFilter;
    use crate::services::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: DocumentService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = DocumentService::new(
            store.clone(),
            AuditLedger::new(store.clone()),
            Arc::new(HeuristicScorer),
            Duration::from_secs(1),
        );
        Fixture { store, service }
    }

    async fn principal(store: &MemoryStore, role: Role, org: Option<Uuid>) -> SessionClaims {
        let (p, vault) = Principal::new_with_vault(
            format!("{}@example.com", Uuid::new_v4()),
            Uuid::new_v4().to_string(),
            Some(Uuid::new_v4().simple().to_string()),
            "hash".into(),
            role,
            org,
        );
        let entry = AuditLogEntry::new(
            None,
            AuditAction::UserCreated,
            Some(p.id),
            TargetKind::Principal,
            AuditDetails::UserCreated {
                role: role.as_str().to_string(),
                organization_id: org,
            },
        );
        store.create_principal(&p, &vault, &entry).await.unwrap();
        SessionClaims {
            sub: p.id,
            role,
            vault_id: p.vault_id,
            aud: "vault-session".into(),
            iss: "test".into(),
            exp: 0,
            iat: 0,
            jti: Uuid::new_v4(),
        }
    }

    fn upload() -> NewUpload {
        NewUpload {
            doc_type: "Birth Certificate".into(),
            title: "My birth certificate".into(),
            content_locator: "s3://vault/bc.pdf".into(),
            size_bytes: 1024,
            mime_type: "application/pdf".into(),
            content_hash: Some("abc".into()),
        }
    }

    async fn count(store: &MemoryStore, action: AuditAction) -> usize {
        store
            .query_audit(&AuditFilter {
                action: Some(action),
                limit: 500,
                ..Default::default()
            })
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn approve_only_from_pending() {
        let f = fixture();
        let citizen = principal(&f.store, Role::Citizen, None).await;
        let officer = principal(&f.store, Role::GovOfficial, None).await;

        let doc = f.service.upload(&citizen, upload()).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::PendingVerification);
        assert!(doc.metadata.authenticity_score.is_some());

        let outcome = f
            .service
            .verify(&officer, doc.id, Decision::Approve, None)
            .await
            .unwrap();
        let VerifyOutcome::Verified(verified) = outcome else {
            panic!("expected verified outcome");
        };
        assert_eq!(verified.gov_audit.verified_by, Some(officer.sub));

        let again = f
            .service
            .verify(&officer, doc.id, Decision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(again, ServiceError::Conflict(_)));
        assert_eq!(count(&f.store, AuditAction::DocumentVerified).await, 1);
    }

    #[tokio::test]
    async fn requested_document_cannot_be_verified() {
        let f = fixture();
        let citizen = principal(&f.store, Role::Citizen, None).await;
        let officer = principal(&f.store, Role::GovOfficial, None).await;

        let doc = f
            .service
            .request(
                &citizen,
                NewRequest {
                    doc_type: "Passport".into(),
                    title: "Passport".into(),
                    notes: Some("renewal".into()),
                },
            )
            .await
            .unwrap();

        let err = f
            .service
            .verify(&officer, doc.id, Decision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn reject_needs_reason_before_touching_anything() {
        let f = fixture();
        let citizen = principal(&f.store, Role::Citizen, None).await;
        let officer = principal(&f.store, Role::GovOfficial, None).await;
        let doc = f.service.upload(&citizen, upload()).await.unwrap();

        let err = f
            .service
            .verify(&officer, doc.id, Decision::Reject, Some("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(f.store.find_document(doc.id).await.unwrap().is_some());
        assert_eq!(count(&f.store, AuditAction::DocumentDeletedRejected).await, 0);
    }

    #[tokio::test]
    async fn reject_deletes_and_records_original_fields() {
        let f = fixture();
        let citizen = principal(&f.store, Role::Citizen, None).await;
        let officer = principal(&f.store, Role::GovAssociate, None).await;
        let doc = f.service.upload(&citizen, upload()).await.unwrap();

        let outcome = f
            .service
            .verify(&officer, doc.id, Decision::Reject, Some("Illegible".into()))
            .await
            .unwrap();
        let VerifyOutcome::Rejected(snapshot) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(snapshot.status, DocumentStatus::Rejected);
        assert_eq!(snapshot.gov_audit.rejection_reason.as_deref(), Some("Illegible"));
        assert!(f.store.find_document(doc.id).await.unwrap().is_none());

        let entries = f
            .store
            .query_audit(&AuditFilter {
                action: Some(AuditAction::DocumentDeletedRejected),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["reason"], "Illegible");
        assert_eq!(entries[0].details["originalTitle"], "My birth certificate");
        assert_eq!(entries[0].details["originalType"], "Birth Certificate");
    }

    #[tokio::test]
    async fn routing_tags_limit_officers() {
        let f = fixture();
        let org = Organization::new(
            "Passports".into(),
            "agency".into(),
            "PPT".into(),
            1,
            vec!["Passport".into()],
        );
        let entry = AuditLogEntry::new(
            None,
            AuditAction::OrganizationCreated,
            Some(org.id),
            TargetKind::Organization,
            AuditDetails::OrganizationCreated {
                code: org.code.clone(),
                name: org.name.clone(),
            },
        );
        f.store.create_organization(&org, &entry).await.unwrap();

        let citizen = principal(&f.store, Role::Citizen, None).await;
        let officer = principal(&f.store, Role::GovOfficial, Some(org.id)).await;
        let doc = f.service.upload(&citizen, upload()).await.unwrap();

        let err = f
            .service
            .verify(&officer, doc.id, Decision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(
            f.store.find_document(doc.id).await.unwrap().unwrap().status,
            DocumentStatus::PendingVerification
        );
    }

    #[tokio::test]
    async fn sweep_expires_only_lapsed_documents() {
        let f = fixture();
        let admin = principal(&f.store, Role::GovAdmin, None).await;
        let citizen_claims = principal(&f.store, Role::Citizen, None).await;
        let citizen = f
            .store
            .find_principal_by_id(citizen_claims.sub)
            .await
            .unwrap()
            .unwrap();

        let lasting = f
            .service
            .issue(
                &admin,
                NewIssuance {
                    nin: citizen.nin.clone().unwrap(),
                    doc_type: "Driving Licence".into(),
                    title: "Licence".into(),
                    content_locator: "s3://vault/dl.pdf".into(),
                    metadata: None,
                    valid_until: Some(Utc::now() + chrono::Duration::days(30)),
                },
            )
            .await
            .unwrap();

        // Issuance refuses a past deadline, so seed an already-lapsed document.
        let mut lapsing = Document::new(
            citizen.id,
            citizen.vault_id,
            "Driving Licence".into(),
            "Old licence".into(),
            DocumentStatus::Issued,
        );
        lapsing.content_locator = Some("s3://vault/old-dl.pdf".into());
        lapsing.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        let entry = AuditLogEntry::new(
            None,
            AuditAction::DocumentIssued,
            Some(lapsing.id),
            TargetKind::Document,
            AuditDetails::DocumentIssued {
                doc_type: lapsing.doc_type.clone(),
                title: lapsing.title.clone(),
                owner_id: lapsing.owner_id,
            },
        );
        f.store.insert_document(&lapsing, &entry).await.unwrap();

        assert_eq!(f.service.expire_lapsed(&admin).await.unwrap(), 1);
        assert_eq!(
            f.store.find_document(lapsing.id).await.unwrap().unwrap().status,
            DocumentStatus::Expired
        );
        assert_eq!(
            f.store.find_document(lasting.id).await.unwrap().unwrap().status,
            DocumentStatus::Issued
        );
        assert_eq!(f.service.expire_lapsed(&admin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn issuance_to_unknown_nin_is_not_found() {
        let f = fixture();
        let admin = principal(&f.store, Role::GovAdmin, None).await;
        let err = f
            .service
            .issue(
                &admin,
                NewIssuance {
                    nin: "0000000".into(),
                    doc_type: "Passport".into(),
                    title: "Passport".into(),
                    content_locator: "s3://x".into(),
                    metadata: None,
                    valid_until: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
