//! In-process change feed.
//!
//! Every committed mutation publishes one or more [`ChangeEvent`]s on a
//! broadcast channel. The HTTP layer turns subscriptions into Server-Sent
//! Event streams filtered per group or per user.

use ltm_store::{Group, GroupMessage, GroupUser};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    MessageCreated {
        message: GroupMessage,
    },
    MemberAdded {
        member: GroupUser,
    },
    MemberRemoved {
        group_id: Uuid,
        user_id: String,
    },
    GroupUpdated {
        group: Group,
    },
    GroupDeleted {
        group_id: Uuid,
        member_user_ids: Vec<String>,
    },
}

impl ChangeEvent {
    pub fn group_id(&self) -> Uuid {
        match self {
            Self::MessageCreated { message } => message.group_id,
            Self::MemberAdded { member } => member.group_id,
            Self::MemberRemoved { group_id, .. } => *group_id,
            Self::GroupUpdated { group } => group.id,
            Self::GroupDeleted { group_id, .. } => *group_id,
        }
    }

    /// Membership changes that affect `user_id`'s list of groups.
    pub fn concerns_user(&self, user_id: &str) -> bool {
        match self {
            Self::MemberAdded { member } => member.user_id == user_id,
            Self::MemberRemoved { user_id: removed, .. } => removed == user_id,
            Self::GroupDeleted { member_user_ids, .. } => {
                member_user_ids.iter().any(|m| m == user_id)
            }
            Self::MessageCreated { .. } | Self::GroupUpdated { .. } => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "messageCreated",
            Self::MemberAdded { .. } => "memberAdded",
            Self::MemberRemoved { .. } => "memberRemoved",
            Self::GroupUpdated { .. } => "groupUpdated",
            Self::GroupDeleted { .. } => "groupDeleted",
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish committed changes. Having no subscribers is not an error.
    pub fn publish(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            if self.tx.send(event).is_err() {
                tracing::trace!("change feed has no subscribers");
            }
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
