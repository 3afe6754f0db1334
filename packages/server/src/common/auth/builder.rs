use super::{AuthError, Capability};
use crate::domains::auth::SessionClaims;

/// Entry point for authorization checks
///
/// Usage:
/// ```ignore
/// Actor::from_claims(&user.claims)
///     .can(Capability::OrgManage)
///     .check()?;
/// ```
pub struct Actor<'a> {
    claims: &'a SessionClaims,
}

impl<'a> Actor<'a> {
    pub fn from_claims(claims: &'a SessionClaims) -> Self {
        Self { claims }
    }

    /// Resolve an optional session into an actor, failing when anonymous.
    pub fn require(claims: Option<&'a SessionClaims>) -> Result<Self, AuthError> {
        claims
            .map(Self::from_claims)
            .ok_or(AuthError::AuthenticationRequired)
    }

    pub fn claims(&self) -> &'a SessionClaims {
        self.claims
    }

    /// Specify what capability the actor needs
    pub fn can(self, capability: Capability) -> CapabilityBuilder<'a> {
        CapabilityBuilder {
            claims: self.claims,
            capability,
        }
    }
}

/// Builder after specifying capability
pub struct CapabilityBuilder<'a> {
    claims: &'a SessionClaims,
    capability: Capability,
}

impl CapabilityBuilder<'_> {
    /// Permissions are the ones frozen into the session at issuance. A role
    /// never implies a capability that is not listed.
    pub fn check(self) -> Result<(), AuthError> {
        let code = self.capability.code();
        if self.claims.permissions.iter().any(|p| p == code) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(code.to_string()))
        }
    }
}
