//! External delivery channels for staff notifications.

pub mod email;
