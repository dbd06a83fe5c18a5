use crate::navigation::Route;
use crate::session::Credential;

use super::claims::TokenClaims;

/// Role a single call asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Use the gateway's configured default role, if it has one.
    #[default]
    Inherit,
    /// Any authenticated session may make this call.
    Unrestricted,
    /// The decoded claims must include this role.
    Require(String),
}

impl RoleRequirement {
    /// Resolve against the gateway default.
    #[must_use]
    pub fn resolve<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        match self {
            Self::Inherit => default,
            Self::Unrestricted => None,
            Self::Require(role) => Some(role),
        }
    }
}

/// Outcome of a local access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(Route),
}

/// The role gate applied by the outbound interceptor.
///
/// Returns the missing role, if any.
pub fn missing_role<'a>(claims: &TokenClaims, required: Option<&'a str>) -> Option<&'a str> {
    required.filter(|role| !claims.has_role(role))
}

/// Route guard for a page restricted to `allowed_roles`.
///
/// No session sends the user to login; a session sharing no role with
/// `allowed_roles` sends them to the unauthorized page. An empty list admits
/// any session. This only decides what the UI shows; every call the page makes
/// is still checked by the backend.
pub fn check_access(credential: Option<&Credential>, allowed_roles: &[&str]) -> Access {
    let Some(credential) = credential else {
        return Access::Redirect(Route::Login);
    };
    if allowed_roles.is_empty() || allowed_roles.iter().any(|role| credential.has_role(role)) {
        Access::Granted
    } else {
        Access::Redirect(Route::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn claims(roles: &[&str]) -> TokenClaims {
        TokenClaims {
            roles: roles.iter().map(|r| (*r).to_string()).collect::<BTreeSet<_>>(),
            ..TokenClaims::default()
        }
    }

    #[test]
    fn test_requirement_resolution() {
        assert_eq!(RoleRequirement::Inherit.resolve(Some("Admin")), Some("Admin"));
        assert_eq!(RoleRequirement::Inherit.resolve(None), None);
        assert_eq!(RoleRequirement::Unrestricted.resolve(Some("Admin")), None);
        assert_eq!(
            RoleRequirement::Require("Operator".into()).resolve(Some("Admin")),
            Some("Operator")
        );
    }

    #[test]
    fn test_missing_role() {
        assert_eq!(missing_role(&claims(&["Admin"]), Some("Admin")), None);
        assert_eq!(missing_role(&claims(&["Operator"]), Some("Admin")), Some("Admin"));
        assert_eq!(missing_role(&claims(&[]), None), None);
    }

    #[test]
    fn test_route_guard() {
        let session = Credential::new("t", "r", Utc::now() + Duration::hours(1), ["Operator"]);

        assert_eq!(check_access(None, &["Admin"]), Access::Redirect(Route::Login));
        assert_eq!(
            check_access(Some(&session), &["Admin"]),
            Access::Redirect(Route::Unauthorized)
        );
        assert_eq!(
            check_access(Some(&session), &["Admin", "Operator"]),
            Access::Granted
        );
        assert_eq!(check_access(Some(&session), &[]), Access::Granted);
    }
}
