//! Side effects collected during a transaction and dispatched after commit.
//!
//! Nothing here can fail the operation that produced it: recipient lookups
//! that error are logged and skipped, and publishing to the bus never fails.

use std::collections::BTreeSet;

use academy_core::types::DbId;
use academy_events::{Notice, PlatformEvent};

use crate::context::Context;

/// Who a notice is addressed to, before directory resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(DbId),
    Role(&'static str),
    /// `@username` tokens from a comment.
    Mentions(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct DraftNotice {
    pub audience: Vec<Audience>,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub contact_email: Option<String>,
    /// Never notify this user (normally the actor).
    pub exclude: Option<DbId>,
}

impl DraftNotice {
    pub fn new(audience: Vec<Audience>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            audience,
            title: title.into(),
            message: message.into(),
            link: None,
            contact_email: None,
            exclude: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn contact_email(mut self, email: Option<String>) -> Self {
        self.contact_email = email;
        self
    }

    pub fn excluding(mut self, user_id: Option<DbId>) -> Self {
        self.exclude = user_id;
        self
    }
}

#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<(PlatformEvent, Option<DraftNotice>)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PlatformEvent) {
        self.entries.push((event, None));
    }

    pub fn push_notice(&mut self, event: PlatformEvent, notice: DraftNotice) {
        self.entries.push((event, Some(notice)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve recipients and publish everything on the bus.
    pub async fn flush(self, ctx: &Context) {
        for (event, draft) in self.entries {
            let event = match draft {
                Some(draft) => {
                    let recipients = resolve_audience(ctx, &draft).await;
                    event.with_notice(Notice {
                        recipients,
                        title: draft.title,
                        message: draft.message,
                        link: draft.link,
                        contact_email: draft.contact_email,
                    })
                }
                None => event,
            };
            ctx.bus.publish(event);
        }
    }
}

async fn resolve_audience(ctx: &Context, draft: &DraftNotice) -> Vec<DbId> {
    let mut ids = BTreeSet::new();
    for audience in &draft.audience {
        match audience {
            Audience::User(id) => {
                ids.insert(*id);
            }
            Audience::Role(role) => match ctx.directory.users_with_role(role).await {
                Ok(users) => ids.extend(users.into_iter().map(|u| u.id)),
                Err(e) => tracing::warn!(error = %e, role, "Role lookup failed"),
            },
            Audience::Mentions(names) => {
                for name in names {
                    match ctx.directory.find_by_username(name).await {
                        Ok(Some(user)) => {
                            ids.insert(user.id);
                        }
                        Ok(None) => tracing::debug!(username = %name, "Unknown mention"),
                        Err(e) => tracing::warn!(error = %e, username = %name, "Mention lookup failed"),
                    }
                }
            }
        }
    }
    if let Some(excluded) = draft.exclude {
        ids.remove(&excluded);
    }
    ids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use academy_db::MemoryStore;
    use academy_events::{DirectoryUser, EventBus, StaticDirectory};

    use super::*;

    fn user(id: DbId, username: &str, role: &str) -> DirectoryUser {
        DirectoryUser {
            id,
            username: username.to_string(),
            role: role.to_string(),
            email: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn flush_resolves_mentions_and_roles() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let directory = StaticDirectory::new(vec![
            user(1, "priya", "approver"),
            user(2, "ravi", "counsellor"),
            user(3, "sam", "approver"),
        ]);
        let ctx = Context::new(Arc::new(MemoryStore::new()), bus)
            .with_directory(Arc::new(directory));

        let mut outbox = Outbox::new();
        outbox.push_notice(
            PlatformEvent::new("approval.requested"),
            DraftNotice::new(
                vec![
                    Audience::Role("approver"),
                    Audience::Mentions(vec!["ravi".into(), "ghost".into()]),
                ],
                "Approval needed",
                "Please review",
            )
            .excluding(Some(3)),
        );
        outbox.flush(&ctx).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.notice.unwrap().recipients, vec![1, 2]);
    }
}
