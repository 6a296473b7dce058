//! Postgres repositories, one zero-sized struct per table.
//!
//! Each repository provides async methods that accept a `&mut PgConnection`
//! (normally the connection of an open transaction) and return
//! `StoreResult<T>`.

pub mod approval_repo;
pub mod assignment_repo;
pub mod audit_repo;
pub mod batch_repo;
pub mod lead_repo;
pub mod student_repo;

pub use approval_repo::ApprovalRepo;
pub use assignment_repo::AssignmentRepo;
pub use audit_repo::AuditRepo;
pub use batch_repo::BatchRepo;
pub use lead_repo::LeadRepo;
pub use student_repo::StudentRepo;
