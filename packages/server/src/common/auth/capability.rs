/// Capabilities carried as permission codes in identity records and sessions.
///
/// Codes are opaque to the auth flow; only downstream handlers interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create, update and disable any account
    UsersManage,

    /// Manage every organization in the program
    OrgsManage,

    /// Manage the caller's own organization
    OrgManage,

    /// Create, update and archive projects
    ProjectsManage,

    /// Edit projects of the caller's organization
    ProjectsWrite,

    ProjectsRead,

    ReposManage,

    ReposRead,

    /// See member directories
    MembersRead,
}

impl Capability {
    pub fn code(&self) -> &'static str {
        match self {
            Capability::UsersManage => "users:manage",
            Capability::OrgsManage => "orgs:manage",
            Capability::OrgManage => "org:manage",
            Capability::ProjectsManage => "projects:manage",
            Capability::ProjectsWrite => "projects:write",
            Capability::ProjectsRead => "projects:read",
            Capability::ReposManage => "repos:manage",
            Capability::ReposRead => "repos:read",
            Capability::MembersRead => "members:read",
        }
    }
}
