use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::auth::Capability;

/// Program roles. Serialized as their stable `R00x` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleId {
    #[serde(rename = "R001")]
    Admin,
    #[serde(rename = "R002")]
    ProgramCoordinator,
    #[serde(rename = "R003")]
    OrgManager,
    #[serde(rename = "R004")]
    Developer,
    #[serde(rename = "R005")]
    Mentor,
}

impl RoleId {
    pub const ALL: [RoleId; 5] = [
        RoleId::Admin,
        RoleId::ProgramCoordinator,
        RoleId::OrgManager,
        RoleId::Developer,
        RoleId::Mentor,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RoleId::Admin => "R001",
            RoleId::ProgramCoordinator => "R002",
            RoleId::OrgManager => "R003",
            RoleId::Developer => "R004",
            RoleId::Mentor => "R005",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.code() == code)
    }

    /// Roles a person may pick for themselves at signup.
    pub fn is_self_service(&self) -> bool {
        !matches!(self, RoleId::Admin)
    }

    /// Roles whose accounts must be linked to an organization.
    pub fn requires_org(&self) -> bool {
        matches!(self, RoleId::OrgManager)
    }

    /// Permission codes granted when an account with this role is created.
    pub fn default_permissions(&self) -> Vec<String> {
        let capabilities: &[Capability] = match self {
            RoleId::Admin => &[
                Capability::UsersManage,
                Capability::OrgsManage,
                Capability::ProjectsManage,
                Capability::ReposManage,
                Capability::MembersRead,
            ],
            RoleId::ProgramCoordinator => &[
                Capability::OrgsManage,
                Capability::ProjectsManage,
                Capability::MembersRead,
            ],
            RoleId::OrgManager => &[
                Capability::OrgManage,
                Capability::ProjectsWrite,
                Capability::MembersRead,
            ],
            RoleId::Developer => &[Capability::ProjectsRead, Capability::ReposRead],
            RoleId::Mentor => &[Capability::ProjectsRead, Capability::MembersRead],
        };

        capabilities.iter().map(|c| c.code().to_string()).collect()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role id: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for RoleId {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl TryFrom<String> for RoleId {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for role in RoleId::ALL {
            assert_eq!(RoleId::from_code(role.code()), Some(role));
        }
        assert_eq!(RoleId::from_code("R999"), None);
    }

    #[test]
    fn serializes_as_code() {
        assert_eq!(serde_json::to_string(&RoleId::Developer).unwrap(), "\"R004\"");
        let role: RoleId = serde_json::from_str("\"R005\"").unwrap();
        assert_eq!(role, RoleId::Mentor);
    }

    #[test]
    fn admin_is_not_self_service() {
        assert!(!RoleId::Admin.is_self_service());
        assert!(RoleId::Developer.is_self_service());
    }

    #[test]
    fn only_org_managers_require_an_org() {
        assert!(RoleId::OrgManager.requires_org());
        assert!(!RoleId::Mentor.requires_org());
    }

    #[test]
    fn developer_defaults_are_read_only() {
        assert_eq!(
            RoleId::Developer.default_permissions(),
            vec!["projects:read".to_string(), "repos:read".to_string()]
        );
    }
}
