//! Request handlers, one module per resource.
//!
//! Handlers validate the request shape, call into the lifecycle services and
//! wrap results in [`DataResponse`](crate::response::DataResponse).

pub mod approvals;
pub mod batches;
pub mod leads;
pub mod public;
pub mod students;
pub mod sweeps;
