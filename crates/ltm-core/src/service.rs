use ltm_store::{Database, UserIndex};
use tokio::sync::broadcast;

use crate::config::WorkflowConfig;
use crate::error::{ChatError, Result};
use crate::feed::{ChangeEvent, ChangeFeed};

/// Entry point for every chat operation.
///
/// Operations are synchronous and take the acting user's identity subject.
/// Each mutation commits in a single database transaction and publishes
/// its change events only after the commit succeeds.
pub struct ChatService {
    pub(crate) db: Database,
    pub(crate) config: WorkflowConfig,
    pub(crate) feed: ChangeFeed,
}

impl ChatService {
    pub fn new(db: Database, config: WorkflowConfig) -> Self {
        Self {
            db,
            config,
            feed: ChangeFeed::default(),
        }
    }

    /// Use an existing feed, e.g. one shared with the HTTP layer.
    pub fn with_feed(db: Database, config: WorkflowConfig, feed: ChangeFeed) -> Self {
        Self { db, config, feed }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Profile of the acting user. Callers are expected to have run
    /// `ensure_user` first.
    pub(crate) fn current_user(&self, actor: &str) -> Result<UserIndex> {
        self.db
            .find_user_by_user_id(actor)?
            .ok_or(ChatError::NotFound("user"))
    }
}
