pub mod audit_log;
pub mod document;
pub mod organization;
pub mod principal;
pub mod registry;
pub mod role;

pub use audit_log::{AuditAction, AuditDetails, AuditLogEntry, TargetKind};
pub use document::{Decision, Document, DocumentMetadata, DocumentStatus, GovAudit};
pub use organization::Organization;
pub use principal::{normalize_identifier, Principal, Vault};
pub use registry::{NinBundle, RegistryMatch, RegistryRecord};
pub use role::Role;
