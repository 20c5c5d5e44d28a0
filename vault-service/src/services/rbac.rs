//! Route-level access policy. An ordered table of path patterns; the first
//! pattern that matches decides, and unmatched paths are denied.

use super::jwt::SessionClaims;
use crate::models::{Organization, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Any verified session.
    Authenticated,
    /// Guarded by a step-up bearer token checked in the handler.
    StepUp,
    /// A verified session whose role is in the list. An empty list denies
    /// every session.
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbacDecision {
    Allow,
    Unauthenticated,
    Forbidden,
}

const CITIZEN: &[Role] = &[Role::Citizen];
const GOV_ADMIN: &[Role] = &[Role::GovAdmin];
const GOVERNMENT: &[Role] = &Role::GOVERNMENT;
const NOBODY: &[Role] = &[];

#[derive(Debug, Clone)]
struct Rule {
    segments: Vec<String>,
    access: Access,
}

impl Rule {
    fn new(pattern: &str, access: Access) -> Self {
        Self {
            segments: split(pattern).map(str::to_string).collect(),
            access,
        }
    }

    /// Segment-wise prefix match; `*` matches exactly one segment.
    fn matches(&self, path: &[&str]) -> bool {
        path.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(pattern, segment)| pattern == "*" || pattern == segment)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct RbacPolicy {
    rules: Vec<Rule>,
}

impl RbacPolicy {
    /// The vault route table. `docs_access` governs the OpenAPI document and
    /// Swagger UI.
    pub fn standard(docs_access: Access) -> Self {
        let rules = vec![
            Rule::new("/health", Access::Public),
            Rule::new("/metrics", Access::Public),
            Rule::new("/.well-known", docs_access),
            Rule::new("/docs", docs_access),
            Rule::new("/login", Access::Public),
            Rule::new("/auth/login", Access::Public),
            Rule::new("/auth/register", Access::Public),
            Rule::new("/auth/request-reset", Access::Public),
            Rule::new("/auth/reset-validate", Access::Public),
            Rule::new("/auth/reset-password", Access::Public),
            Rule::new("/auth/step-up", Access::Authenticated),
            Rule::new("/auth/logout", Access::Authenticated),
            Rule::new("/me", Access::Authenticated),
            Rule::new("/documents/*/view", Access::StepUp),
            Rule::new("/documents", Access::Roles(CITIZEN)),
            Rule::new("/dashboard", Access::Roles(CITIZEN)),
            Rule::new("/gov/admin", Access::Roles(GOV_ADMIN)),
            Rule::new("/gov", Access::Roles(GOVERNMENT)),
        ];
        Self { rules }
    }

    pub fn access_for(&self, path: &str) -> Access {
        let segments: Vec<&str> = split(path).collect();
        self.rules
            .iter()
            .find(|rule| rule.matches(&segments))
            .map(|rule| rule.access)
            .unwrap_or(Access::Roles(NOBODY))
    }

    pub fn authorize(&self, path: &str, session: Option<&SessionClaims>) -> RbacDecision {
        match (self.access_for(path), session) {
            (Access::Public | Access::StepUp, _) => RbacDecision::Allow,
            (_, None) => RbacDecision::Unauthenticated,
            (Access::Authenticated, Some(_)) => RbacDecision::Allow,
            (Access::Roles(roles), Some(claims)) if roles.contains(&claims.role) => {
                RbacDecision::Allow
            }
            (Access::Roles(_), Some(_)) => RbacDecision::Forbidden,
        }
    }
}

/// Whether a government principal may verify or issue `doc_type`.
/// `gov_admin` and principals without an organization are unrestricted.
pub fn permits_document_type(
    role: Role,
    organization: Option<&Organization>,
    doc_type: &str,
) -> bool {
    match (role, organization) {
        (Role::Citizen, _) => false,
        (Role::GovAdmin, _) | (_, None) => true,
        (_, Some(org)) => org.handles(doc_type),
    }
}
