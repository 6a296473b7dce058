//! Academy domain core: statuses, the lead transition table, governance
//! request kinds, plan arithmetic, and the shared error type.
//!
//! This crate has zero internal dependencies so the repository, engine and
//! HTTP layers can all share it.

pub mod approval;
pub mod audit;
pub mod clock;
pub mod error;
pub mod hashing;
pub mod mentions;
pub mod policy;
pub mod roles;
pub mod status;
pub mod subscription;
pub mod transitions;
pub mod types;
