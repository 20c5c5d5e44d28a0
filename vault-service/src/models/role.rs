//! The single role model shared by sessions, RBAC and principals.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    GovAdmin,
    GovOfficial,
    GovAssociate,
}

impl Role {
    pub const GOVERNMENT: [Role; 3] = [Role::GovAdmin, Role::GovOfficial, Role::GovAssociate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::GovAdmin => "gov_admin",
            Role::GovOfficial => "gov_official",
            Role::GovAssociate => "gov_associate",
        }
    }

    pub fn is_government(&self) -> bool {
        !matches!(self, Role::Citizen)
    }

    /// Where a browser is sent when it reaches a page its role may not see.
    pub fn landing_page(&self) -> &'static str {
        if self.is_government() {
            "/gov/dashboard"
        } else {
            "/dashboard"
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Role::Citizen),
            "gov_admin" => Ok(Role::GovAdmin),
            "gov_official" => Ok(Role::GovOfficial),
            "gov_associate" => Ok(Role::GovAssociate),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_storage_code() {
        for role in [Role::Citizen, Role::GovAdmin, Role::GovOfficial, Role::GovAssociate] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn coarse_gov_code_is_not_a_role() {
        assert!("gov".parse::<Role>().is_err());
    }

    #[test]
    fn only_citizen_is_non_government() {
        assert!(!Role::Citizen.is_government());
        assert!(Role::GOVERNMENT.iter().all(Role::is_government));
    }
}
