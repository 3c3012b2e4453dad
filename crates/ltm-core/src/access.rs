//! Authorization checks shared by all operations.
//!
//! Group-scoped reads and writes require a membership row. Management
//! operations additionally require the group's admin. Profile edits are
//! limited to the profile's owner or a user with the global Owner role.

use ltm_store::{Database, Group, GroupUser, StoreError, UserIndex};
use uuid::Uuid;

use crate::error::{ChatError, Result};

pub(crate) const NOT_A_MEMBER: ChatError = ChatError::Forbidden("not a member of this group");

/// Load the group and the actor's membership in it.
///
/// A missing group and a group the actor does not belong to are
/// indistinguishable to the caller.
pub fn require_member(db: &Database, group_id: Uuid, user_id: &str) -> Result<(Group, GroupUser)> {
    let member = db.find_member(group_id, user_id)?.ok_or(NOT_A_MEMBER)?;
    let group = db.get_group(group_id).map_err(|e| match e {
        StoreError::NotFound => NOT_A_MEMBER,
        other => other.into(),
    })?;
    Ok((group, member))
}

/// Like [`require_member`], but the actor must also be the group admin.
pub fn require_admin(db: &Database, group_id: Uuid, user_id: &str) -> Result<(Group, GroupUser)> {
    let (group, member) = require_member(db, group_id, user_id)?;
    if !member.role.can_manage_group() || group.admin_user_id != user_id {
        return Err(ChatError::Forbidden("only the group admin can do this"));
    }
    Ok((group, member))
}

pub fn can_edit_profile(actor: &UserIndex, target: &UserIndex) -> bool {
    actor.id == target.id || actor.role.is_owner()
}

pub fn require_owner(actor: &UserIndex) -> Result<()> {
    if actor.role.is_owner() {
        Ok(())
    } else {
        Err(ChatError::Forbidden("only an owner can do this"))
    }
}
