//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the staff member behind a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.
//! - [`rbac::RequireApprover`] -- requires a role that resolves approvals.

pub mod auth;
pub mod rbac;
