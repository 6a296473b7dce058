//! Well-known role name constants.
//!
//! Role names are carried by users in the staff directory.

/// Unrestricted role. Acts directly and never files approval requests.
pub const ROLE_ADMIN: &str = "admin";
/// Second-approver role for governance requests.
pub const ROLE_APPROVER: &str = "approver";
pub const ROLE_COUNSELLOR: &str = "counsellor";
pub const ROLE_COACH: &str = "coach";

/// Roles that may resolve approval requests.
pub fn can_resolve_approvals(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_APPROVER
}

/// Roles that must go through governance for restricted mutations.
///
/// Holders of an approving role act directly, so a request filed by them
/// could be resolved by themselves.
pub fn requires_approval(role: &str) -> bool {
    !can_resolve_approvals(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_and_approver_resolve() {
        assert!(can_resolve_approvals(ROLE_ADMIN));
        assert!(can_resolve_approvals(ROLE_APPROVER));
        assert!(!can_resolve_approvals(ROLE_COUNSELLOR));
        assert!(!can_resolve_approvals(ROLE_COACH));
    }

    #[test]
    fn restricted_roles_require_approval() {
        assert!(requires_approval(ROLE_COUNSELLOR));
        assert!(requires_approval(ROLE_COACH));
        assert!(!requires_approval(ROLE_ADMIN));
    }
}
