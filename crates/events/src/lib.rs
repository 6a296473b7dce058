//! Academy event bus and notification infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope, optionally carrying a
//!   [`Notice`] for staff.
//! - [`directory`]: staff lookup used to resolve mentions and role
//!   recipients.
//! - [`notify`]: in-app notification sinks.
//! - [`delivery`]: external delivery channels (email).
//! - [`NotificationRouter`]: turns notices on the bus into deliveries.

pub mod bus;
pub mod delivery;
pub mod directory;
pub mod notify;
pub mod router;

pub use bus::{EventBus, Notice, PlatformEvent};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use directory::{DirectoryUser, StaticDirectory, UserDirectory};
pub use notify::{LogSink, MemorySink, Notification, NotificationSink};
pub use router::NotificationRouter;
