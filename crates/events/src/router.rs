//! Event-to-notification routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and, for every event
//! carrying a [`Notice`](crate::Notice), delivers one in-app notification
//! per recipient and, when SMTP is configured, an email to recipients with a
//! known address. Delivery failures are logged and never retried.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::bus::{Notice, PlatformEvent};
use crate::delivery::email::EmailDelivery;
use crate::directory::UserDirectory;
use crate::notify::{Notification, NotificationSink};

pub struct NotificationRouter {
    sink: Arc<dyn NotificationSink>,
    directory: Arc<dyn UserDirectory>,
    email: Option<EmailDelivery>,
}

impl NotificationRouter {
    pub fn new(sink: Arc<dyn NotificationSink>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            sink,
            directory,
            email: None,
        }
    }

    pub fn with_email(mut self, email: EmailDelivery) -> Self {
        self.email = Some(email);
        self
    }

    /// Run the routing loop until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver the notice of a single event, if it has one.
    pub async fn route_event(&self, event: &PlatformEvent) {
        let Some(notice) = &event.notice else {
            return;
        };

        for user_id in &notice.recipients {
            let notification = Notification {
                user_id: *user_id,
                kind: event.event_type.clone(),
                title: notice.title.clone(),
                message: notice.message.clone(),
                link: notice.link.clone(),
            };
            if let Err(e) = self.sink.deliver(notification).await {
                tracing::error!(
                    error = %e,
                    user_id,
                    event_type = %event.event_type,
                    "Failed to deliver notification"
                );
            }
        }

        if let Some(email) = &self.email {
            self.send_emails(email, notice).await;
        }
    }

    async fn send_emails(&self, email: &EmailDelivery, notice: &Notice) {
        let mut addresses: Vec<String> = notice.contact_email.iter().cloned().collect();
        for user_id in &notice.recipients {
            match self.directory.find(*user_id).await {
                Ok(Some(user)) => addresses.extend(user.email),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, user_id, "Directory lookup failed");
                }
            }
        }

        for address in addresses {
            if let Err(e) = email.deliver(&address, notice).await {
                tracing::warn!(error = %e, to = %address, "Notification email failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::directory::StaticDirectory;
    use crate::notify::MemorySink;

    fn router(sink: Arc<MemorySink>) -> NotificationRouter {
        NotificationRouter::new(sink, Arc::new(StaticDirectory::default()))
    }

    #[tokio::test]
    async fn notice_fans_out_to_each_recipient() {
        let sink = Arc::new(MemorySink::new());
        let event = PlatformEvent::new("approval.requested").with_notice(Notice {
            recipients: vec![4, 5],
            title: "Approval needed".to_string(),
            message: "Deactivate student 3".to_string(),
            link: None,
            contact_email: None,
        });

        router(Arc::clone(&sink)).route_event(&event).await;

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].user_id, 4);
        assert_eq!(delivered[1].kind, "approval.requested");
    }

    #[tokio::test]
    async fn events_without_notice_are_ignored() {
        let sink = Arc::new(MemorySink::new());
        router(Arc::clone(&sink))
            .route_event(&PlatformEvent::new("lead.status_changed"))
            .await;
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn run_stops_when_bus_is_dropped() {
        let sink = Arc::new(MemorySink::new());
        let bus = EventBus::default();
        let rx = bus.subscribe();
        bus.publish(PlatformEvent::new("lead.mentioned").with_notice(Notice {
            recipients: vec![1],
            title: "Mentioned".to_string(),
            message: "hi".to_string(),
            link: None,
            contact_email: None,
        }));
        drop(bus);

        router(Arc::clone(&sink)).run(rx).await;
        assert_eq!(sink.for_user(1).len(), 1);
    }
}
