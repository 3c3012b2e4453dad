//! Domain records persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer as a JSON response body.

use chrono::{DateTime, SubsecRound, Utc};
use ltm_shared::{ChatStatus, GroupRole, MessageKind, UserRole};
use serde::Serialize;
use uuid::Uuid;

/// Current time at the precision the database stores (microseconds), so a
/// record compares equal to itself after a round trip.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// ---------------------------------------------------------------------------
// UserIndex
// ---------------------------------------------------------------------------

/// Application-level profile of an authenticated principal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIndex {
    /// Record key.
    pub id: Uuid,
    /// Identity subject issued by the identity provider. Unique.
    pub user_id: String,
    pub email: String,
    pub nickname: String,
    /// Global role.
    pub role: UserRole,
    /// Pointer to the group the user last opened (bare id or page URL).
    pub recent_group: Option<String>,
    /// Object storage reference of the profile picture.
    pub photo_ref: Option<String>,
    pub bio: Option<String>,
    /// Bio text only an Owner may edit.
    pub locked_bio: Option<String>,
    /// Billing customer id, recorded on first payment. Unique when set.
    #[serde(skip_serializing)]
    pub billing_customer_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A chat room.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    /// Unique slug used in share links; equals `id`.
    pub url_slug: String,
    /// Identity subject of the group's admin.
    pub admin_user_id: String,
    pub chat_status: ChatStatus,
    /// Profile record of the creator (cleared if that profile is deleted).
    pub creator_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GroupUser
// ---------------------------------------------------------------------------

/// Membership of one user in one group.
///
/// `nickname` and `email` are denormalized copies of the user's profile and
/// must be refreshed whenever the profile changes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupUser {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: String,
    pub role: GroupRole,
    pub nickname: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GroupMessage
// ---------------------------------------------------------------------------

/// An immutable chat event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Identity subject of the author. `None` only for system messages.
    pub author_user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: Option<String>,
    pub image_ref: Option<String>,
    /// Author nickname at posting time.
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

impl GroupMessage {
    /// Build a system-authored announcement.
    pub fn system(group_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            author_user_id: None,
            kind: MessageKind::System,
            content: Some(content.into()),
            image_ref: None,
            nickname: ltm_shared::constants::SYSTEM_NICKNAME.to_string(),
            created_at: timestamp_now(),
        }
    }
}
