//! Domain services: identity, step-up, access policy, document lifecycle
//! and the audit ledger, over a pluggable store.

pub mod audit;
mod database;
pub mod email;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod lifecycle;
mod memory;
pub mod metrics;
pub mod organizations;
pub mod rbac;
pub mod scoring;
pub mod step_up;
pub mod store;

pub use audit::AuditLedger;
pub use database::Database;
pub use email::{EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use identity::IdentityService;
pub use jwt::{JwtService, SessionClaims, StepUpClaims};
pub use lifecycle::DocumentService;
pub use memory::MemoryStore;
pub use organizations::OrganizationService;
pub use rbac::{Access, RbacDecision, RbacPolicy};
pub use scoring::{AuthenticityScorer, HeuristicScorer, HttpScorer};
pub use step_up::StepUpService;
pub use store::{AuditFilter, StoreError, VaultStore};
