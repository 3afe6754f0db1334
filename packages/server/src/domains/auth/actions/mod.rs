//! Auth domain actions - business logic functions
//!
//! Actions are async functions called directly from the HTTP handlers. Each
//! one is a single stateless step of the login or signup flow; everything that
//! links the steps together is carried by the client.

mod complete_login;
mod complete_signup;
mod dispatch_code;
mod logout;
mod precheck;

pub use complete_login::complete_login;
pub use complete_signup::complete_signup;
pub use dispatch_code::dispatch_code;
pub use logout::logout;
pub use precheck::{login_precheck, signup_precheck};

use tracing::debug;

use super::errors::AuthFlowError;
use super::models::{is_valid_email, normalize_email, PhoneNumber};
use super::types::SignupDraft;
use crate::kernel::ServerDeps;

/// Normalize `raw` and reject anything that cannot be a real number, before
/// any store or provider is touched.
pub(crate) fn parse_phone(raw: &str, deps: &ServerDeps) -> Result<PhoneNumber, AuthFlowError> {
    let phone = deps
        .normalizer
        .normalize(raw)
        .map_err(|e| AuthFlowError::InvalidPhoneNumber(e.to_string()))?;

    if !phone.is_plausible() {
        debug!(phone = %phone.masked(), "implausible phone number rejected");
        return Err(AuthFlowError::InvalidPhoneNumber(format!(
            "{} is not a valid phone number",
            phone.masked()
        )));
    }

    Ok(phone)
}

/// Email trimmed and lowercased; blank means absent.
pub(crate) fn parse_email(raw: Option<&str>) -> Result<Option<String>, AuthFlowError> {
    let Some(email) = raw.map(normalize_email).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };
    if !is_valid_email(&email) {
        return Err(AuthFlowError::InvalidProfile("Invalid email address".to_string()));
    }
    Ok(Some(email))
}

/// Profile rules that do not need the store.
pub(crate) fn validate_profile(draft: &SignupDraft) -> Result<(), AuthFlowError> {
    if draft.name.trim().is_empty() {
        return Err(AuthFlowError::InvalidProfile("Name is required".to_string()));
    }
    if !draft.role_id.is_self_service() {
        return Err(AuthFlowError::InvalidProfile(format!(
            "Role {} cannot be chosen at signup",
            draft.role_id
        )));
    }
    if draft.role_id.requires_org() && draft.org_id.is_none() {
        return Err(AuthFlowError::InvalidProfile(format!(
            "Role {} requires an organization",
            draft.role_id
        )));
    }
    parse_email(draft.email.as_deref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::OrgId;
    use crate::domains::auth::models::RoleId;
    use crate::kernel::TestDependencies;

    fn draft(role_id: RoleId) -> SignupDraft {
        SignupDraft {
            name: "Asha".to_string(),
            phone: "9876543210".to_string(),
            email: Some("asha@example.com".to_string()),
            role_id,
            org_id: None,
        }
    }

    #[test]
    fn parse_phone_applies_plausibility_gate() {
        let deps = TestDependencies::new().server_deps();

        assert_eq!(
            parse_phone("98765 43210", &deps).unwrap().as_str(),
            "+919876543210"
        );
        assert!(matches!(
            parse_phone("12345", &deps),
            Err(AuthFlowError::InvalidPhoneNumber(_))
        ));
        assert!(matches!(
            parse_phone("+0123456789", &deps),
            Err(AuthFlowError::InvalidPhoneNumber(_))
        ));
        assert!(matches!(
            parse_phone("call me", &deps),
            Err(AuthFlowError::InvalidPhoneNumber(_))
        ));
    }

    #[test]
    fn profile_rules() {
        assert!(validate_profile(&draft(RoleId::Developer)).is_ok());

        let mut blank_name = draft(RoleId::Mentor);
        blank_name.name = "   ".to_string();
        assert!(matches!(
            validate_profile(&blank_name),
            Err(AuthFlowError::InvalidProfile(_))
        ));

        assert!(matches!(
            validate_profile(&draft(RoleId::Admin)),
            Err(AuthFlowError::InvalidProfile(_))
        ));

        let mut manager = draft(RoleId::OrgManager);
        assert!(validate_profile(&manager).is_err());
        manager.org_id = Some(OrgId::new());
        assert!(validate_profile(&manager).is_ok());

        let mut bad_email = draft(RoleId::Mentor);
        bad_email.email = Some("not-an-email".to_string());
        assert!(validate_profile(&bad_email).is_err());
    }

    #[test]
    fn blank_email_is_absent() {
        assert_eq!(parse_email(Some("  ")).unwrap(), None);
        assert_eq!(parse_email(None).unwrap(), None);
        assert_eq!(
            parse_email(Some(" Asha@Example.COM ")).unwrap(),
            Some("asha@example.com".to_string())
        );
    }
}
