//! Shared collaborators handed to every lifecycle service.

use std::sync::Arc;

use academy_core::clock::{Clock, SystemClock};
use academy_core::error::CoreError;
use academy_core::policy::PolicyConfig;
use academy_core::types::DbId;
use academy_db::{Repository, Store};
use academy_events::{EventBus, StaticDirectory, UserDirectory};
use serde::Deserialize;

/// An authenticated staff member performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    pub user_id: DbId,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: DbId, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }
}

#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn Store>,
    pub bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
    pub directory: Arc<dyn UserDirectory>,
    pub policy: PolicyConfig,
}

impl Context {
    /// Context with the system clock, an empty directory and default policy.
    pub fn new(store: Arc<dyn Store>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            clock: Arc::new(SystemClock),
            directory: Arc::new(StaticDirectory::default()),
            policy: PolicyConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Open a unit of work.
    pub async fn begin(&self) -> Result<Box<dyn Repository>, CoreError> {
        Ok(self.store.begin().await?)
    }
}
