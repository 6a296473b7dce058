//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - An entity struct matching the database row
//! - `Deserialize` create/patch DTOs for inserts and updates

pub mod approval;
pub mod audit;
pub mod batch;
pub mod lead;
pub mod student;
