//! Group lifecycle and membership management.

use std::collections::HashSet;

use ltm_shared::constants::{
    member_added_text, member_left_text, member_removed_text, MAX_GROUP_NAME_CHARS,
};
use ltm_shared::{ChatStatus, GroupRole, UserRole};
use ltm_store::{timestamp_now, Database, Group, GroupMessage, GroupUser, UserIndex};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::access::{require_admin, require_member, NOT_A_MEMBER};
use crate::error::{ChatError, Result};
use crate::feed::ChangeEvent;
use crate::service::ChatService;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGroup {
    pub group: Group,
    pub members: Vec<GroupUser>,
    /// Invited emails with no matching profile.
    pub not_found: Vec<String>,
}

/// Per-email result of adding members to a group.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersReport {
    pub added: Vec<GroupUser>,
    pub already_member: Vec<String>,
    pub not_found: Vec<String>,
}

impl ChatService {
    /// Create a group administered by `actor` and invite `invite_emails`.
    ///
    /// Invitations at creation time are silent: no system message is
    /// posted for them.
    pub fn create_group(&self, actor: &str, name: &str, invite_emails: &[String]) -> Result<CreatedGroup> {
        let name = validate_group_name(name)?;
        let creator = self.current_user(actor)?;

        let id = Uuid::new_v4();
        let group = Group {
            id,
            name,
            url_slug: id.to_string(),
            admin_user_id: creator.user_id.clone(),
            chat_status: ChatStatus::Default,
            creator_ref: Some(creator.id),
            created_at: timestamp_now(),
        };

        let (report, changes) = self.db.transaction(|db| -> Result<_> {
            let mut changes = Vec::new();
            db.insert_group(&group)?;

            let admin = new_member(group.id, &creator, GroupRole::Admin);
            db.insert_member(&admin)?;
            changes.push(ChangeEvent::MemberAdded { member: admin.clone() });

            let mut report = invite(db, group.id, invite_emails, false, &mut changes)?;
            report.added.insert(0, admin);
            Ok((report, changes))
        })?;

        info!(group_id = %group.id, admin = %actor, members = report.added.len(), "created group");
        self.feed.publish(changes);

        Ok(CreatedGroup {
            group,
            members: report.added,
            not_found: report.not_found,
        })
    }

    pub fn get_group(&self, actor: &str, group_id: Uuid) -> Result<Group> {
        Ok(require_member(&self.db, group_id, actor)?.0)
    }

    pub fn get_group_by_slug(&self, actor: &str, slug: &str) -> Result<Group> {
        let group = self
            .db
            .find_group_by_slug(slug.trim())?
            .ok_or(NOT_A_MEMBER)?;
        require_member(&self.db, group.id, actor)?;
        Ok(group)
    }

    /// Groups the actor belongs to, newest first.
    pub fn list_my_groups(&self, actor: &str) -> Result<Vec<Group>> {
        Ok(self.db.list_groups_for_user(actor)?)
    }

    pub fn rename_group(&self, actor: &str, group_id: Uuid, name: &str) -> Result<Group> {
        let name = validate_group_name(name)?;
        require_admin(&self.db, group_id, actor)?;

        self.db.set_group_name(group_id, &name)?;
        let group = self.db.get_group(group_id)?;
        self.feed.publish([ChangeEvent::GroupUpdated { group: group.clone() }]);
        Ok(group)
    }

    /// Delete a group with all its memberships and messages.
    pub fn delete_group(&self, actor: &str, group_id: Uuid) -> Result<()> {
        require_admin(&self.db, group_id, actor)?;

        let member_user_ids = self.db.transaction(|db| -> Result<Vec<String>> {
            let ids = db
                .list_members(group_id)?
                .into_iter()
                .map(|m| m.user_id)
                .collect();
            db.delete_group(group_id)?;
            Ok(ids)
        })?;

        info!(group_id = %group_id, "deleted group");
        self.feed.publish([ChangeEvent::GroupDeleted {
            group_id,
            member_user_ids,
        }]);
        Ok(())
    }

    pub fn list_members(&self, actor: &str, group_id: Uuid) -> Result<Vec<GroupUser>> {
        require_member(&self.db, group_id, actor)?;
        Ok(self.db.list_members(group_id)?)
    }

    /// Add registered users by email. Each addition is announced in the
    /// group.
    pub fn add_members_by_email(&self, actor: &str, group_id: Uuid, emails: &[String]) -> Result<AddMembersReport> {
        require_admin(&self.db, group_id, actor)?;
        if emails.iter().all(|e| e.trim().is_empty()) {
            return Err(ChatError::MissingField("emails"));
        }

        let (report, changes) = self.db.transaction(|db| -> Result<_> {
            let mut changes = Vec::new();
            let report = invite(db, group_id, emails, true, &mut changes)?;
            Ok((report, changes))
        })?;

        info!(
            group_id = %group_id,
            added = report.added.len(),
            not_found = report.not_found.len(),
            "added members"
        );
        self.feed.publish(changes);
        Ok(report)
    }

    /// Remove `target_user_id` from the group. The admin cannot remove
    /// themselves and the lawyer cannot be removed by anyone.
    pub fn remove_member(&self, actor: &str, group_id: Uuid, target_user_id: &str) -> Result<()> {
        require_admin(&self.db, group_id, actor)?;
        if target_user_id == actor {
            return Err(ChatError::Forbidden("the admin cannot remove themselves"));
        }

        let member = self
            .db
            .find_member(group_id, target_user_id)?
            .ok_or(ChatError::NotFound("membership"))?;
        let profile = self.db.find_user_by_user_id(target_user_id)?;
        let is_lawyer = self.config.is_lawyer(target_user_id)
            || profile.as_ref().is_some_and(|p| p.role == UserRole::Lawyer);
        if is_lawyer {
            return Err(ChatError::Forbidden("the lawyer cannot be removed"));
        }

        let nickname = profile.map_or(member.nickname.clone(), |p| p.nickname);
        self.depart(&member, &member_removed_text(&nickname))?;
        info!(group_id = %group_id, user_id = %target_user_id, "removed member");
        Ok(())
    }

    /// Leave a group. The admin must delete the group instead.
    pub fn leave_group(&self, actor: &str, group_id: Uuid) -> Result<()> {
        let (_, member) = require_member(&self.db, group_id, actor)?;
        if member.role == GroupRole::Admin {
            return Err(ChatError::Forbidden("the admin cannot leave; delete the group instead"));
        }

        let nickname = self
            .db
            .find_user_by_user_id(actor)?
            .map_or(member.nickname.clone(), |p| p.nickname);
        self.depart(&member, &member_left_text(&nickname))?;
        info!(group_id = %group_id, user_id = %actor, "member left");
        Ok(())
    }

    fn depart(&self, member: &GroupUser, announcement: &str) -> Result<()> {
        let changes = self.db.transaction(|db| -> Result<_> {
            db.delete_member(member.id)?;
            let notice = GroupMessage::system(member.group_id, announcement);
            db.insert_message(&notice)?;
            Ok([
                ChangeEvent::MemberRemoved {
                    group_id: member.group_id,
                    user_id: member.user_id.clone(),
                },
                ChangeEvent::MessageCreated { message: notice },
            ])
        })?;
        self.feed.publish(changes);
        Ok(())
    }
}

pub(crate) fn new_member(group_id: Uuid, user: &UserIndex, role: GroupRole) -> GroupUser {
    GroupUser {
        id: Uuid::new_v4(),
        group_id,
        user_id: user.user_id.clone(),
        role,
        nickname: user.nickname.clone(),
        email: user.email.clone(),
        created_at: timestamp_now(),
    }
}

/// Add every registered, not-yet-member email to the group. Must run
/// inside a transaction.
fn invite(
    db: &Database,
    group_id: Uuid,
    emails: &[String],
    announce: bool,
    changes: &mut Vec<ChangeEvent>,
) -> Result<AddMembersReport> {
    let mut report = AddMembersReport::default();
    let mut seen = HashSet::new();

    for raw in emails {
        let email = raw.trim();
        if email.is_empty() || !seen.insert(email.to_lowercase()) {
            continue;
        }
        let Some(user) = db.find_user_by_email(email)? else {
            report.not_found.push(email.to_string());
            continue;
        };
        if db.find_member(group_id, &user.user_id)?.is_some() {
            report.already_member.push(email.to_string());
            continue;
        }

        let member = new_member(group_id, &user, GroupRole::Member);
        db.insert_member(&member)?;
        changes.push(ChangeEvent::MemberAdded { member: member.clone() });

        if announce {
            let notice = GroupMessage::system(group_id, member_added_text(&user.nickname));
            db.insert_message(&notice)?;
            changes.push(ChangeEvent::MessageCreated { message: notice });
        }
        report.added.push(member);
    }

    Ok(report)
}

fn validate_group_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ChatError::MissingField("name"));
    }
    if name.chars().count() > MAX_GROUP_NAME_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "group name exceeds {MAX_GROUP_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{service, service_with_lawyer, signup, LAWYER};
    use ltm_shared::MessageKind;
    use ltm_store::StoreError;

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_create_group_with_invites() {
        let svc = service();
        let alice = signup(&svc, "alice");
        signup(&svc, "bob");

        let created = svc
            .create_group(
                "alice",
                "  Weekend Trip ",
                &emails(&["bob@example.com", "ghost@example.com", "BOB@example.com"]),
            )
            .unwrap();

        let group = &created.group;
        assert_eq!(group.name, "Weekend Trip");
        assert_eq!(group.url_slug, group.id.to_string());
        assert_eq!(group.admin_user_id, "alice");
        assert_eq!(group.creator_ref, Some(alice.id));
        assert_eq!(group.chat_status, ChatStatus::Default);
        assert_eq!(created.not_found, vec!["ghost@example.com"]);

        let members = svc.list_members("bob", group.id).unwrap();
        let roles: Vec<_> = members.iter().map(|m| (m.user_id.as_str(), m.role)).collect();
        assert_eq!(roles, vec![("alice", GroupRole::Admin), ("bob", GroupRole::Member)]);

        assert!(svc.db.list_messages_for_group(group.id).unwrap().is_empty());
        assert_eq!(svc.get_group_by_slug("bob", &group.url_slug).unwrap().id, group.id);
    }

    #[test]
    fn test_group_name_validation() {
        let svc = service();
        signup(&svc, "alice");
        assert!(matches!(
            svc.create_group("alice", "   ", &[]),
            Err(ChatError::MissingField("name"))
        ));
        let long = "x".repeat(MAX_GROUP_NAME_CHARS + 1);
        assert!(matches!(
            svc.create_group("alice", &long, &[]),
            Err(ChatError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_members_cannot_read() {
        let svc = service();
        signup(&svc, "alice");
        signup(&svc, "mallory");
        let group = svc.create_group("alice", "Private", &[]).unwrap().group;

        assert!(matches!(svc.get_group("mallory", group.id), Err(ChatError::Forbidden(_))));
        assert!(matches!(svc.list_members("mallory", group.id), Err(ChatError::Forbidden(_))));
        assert!(matches!(
            svc.get_group_by_slug("mallory", &group.url_slug),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            svc.get_group_by_slug("mallory", "no-such-slug"),
            Err(ChatError::Forbidden(_))
        ));
        assert!(svc.list_my_groups("mallory").unwrap().is_empty());
        assert_eq!(svc.list_my_groups("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_add_members_reports_and_announces() {
        let svc = service();
        signup(&svc, "alice");
        signup(&svc, "bob");
        signup(&svc, "carol");
        let group = svc
            .create_group("alice", "Trip", &emails(&["bob@example.com"]))
            .unwrap()
            .group;

        let report = svc
            .add_members_by_email(
                "alice",
                group.id,
                &emails(&["bob@example.com", "carol@example.com", "nobody@example.com"]),
            )
            .unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].user_id, "carol");
        assert_eq!(report.already_member, vec!["bob@example.com"]);
        assert_eq!(report.not_found, vec!["nobody@example.com"]);

        let messages = svc.db.list_messages_for_group(group.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::System);
        assert_eq!(messages[0].author_user_id, None);
        assert_eq!(
            messages[0].content.as_deref(),
            Some("carol has been added to the group")
        );

        assert!(matches!(
            svc.add_members_by_email("bob", group.id, &emails(&["carol@example.com"])),
            Err(ChatError::Forbidden(_))
        ));
    }

    #[test]
    fn test_remove_member_rules() {
        let svc = service_with_lawyer();
        signup(&svc, "alice");
        signup(&svc, "bob");
        signup(&svc, LAWYER);
        let group = svc
            .create_group(
                "alice",
                "Trip",
                &emails(&["bob@example.com", "lawyer@example.com"]),
            )
            .unwrap()
            .group;

        assert!(matches!(
            svc.remove_member("bob", group.id, "alice"),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            svc.remove_member("alice", group.id, "alice"),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            svc.remove_member("alice", group.id, LAWYER),
            Err(ChatError::Forbidden("the lawyer cannot be removed"))
        ));
        assert!(matches!(
            svc.remove_member("alice", group.id, "nobody"),
            Err(ChatError::NotFound("membership"))
        ));

        svc.remove_member("alice", group.id, "bob").unwrap();
        assert!(svc.db.find_member(group.id, "bob").unwrap().is_none());
        let last = svc.db.list_messages_for_group(group.id).unwrap().pop().unwrap();
        assert_eq!(last.content.as_deref(), Some("bob has been removed from the group"));
    }

    #[test]
    fn test_leave_group() {
        let svc = service();
        signup(&svc, "alice");
        signup(&svc, "bob");
        let group = svc
            .create_group("alice", "Trip", &emails(&["bob@example.com"]))
            .unwrap()
            .group;

        assert!(matches!(svc.leave_group("alice", group.id), Err(ChatError::Forbidden(_))));

        svc.leave_group("bob", group.id).unwrap();
        assert!(svc.db.find_member(group.id, "bob").unwrap().is_none());
        let last = svc.db.list_messages_for_group(group.id).unwrap().pop().unwrap();
        assert_eq!(last.content.as_deref(), Some("bob has left the group"));
        assert!(matches!(svc.leave_group("bob", group.id), Err(ChatError::Forbidden(_))));
    }

    #[test]
    fn test_rename_and_delete() {
        let svc = service();
        signup(&svc, "alice");
        signup(&svc, "bob");
        let group = svc
            .create_group("alice", "Trip", &emails(&["bob@example.com"]))
            .unwrap()
            .group;
        let mut rx = svc.subscribe();

        assert!(svc.rename_group("bob", group.id, "Mine").is_err());
        let renamed = svc.rename_group("alice", group.id, " Ski Trip ").unwrap();
        assert_eq!(renamed.name, "Ski Trip");
        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::GroupUpdated { .. }));

        assert!(svc.delete_group("bob", group.id).is_err());
        svc.delete_group("alice", group.id).unwrap();
        assert!(matches!(svc.db.get_group(group.id), Err(StoreError::NotFound)));
        assert!(svc.db.list_members(group.id).unwrap().is_empty());
        match rx.try_recv().unwrap() {
            ChangeEvent::GroupDeleted { member_user_ids, .. } => {
                assert_eq!(member_user_ids, vec!["alice", "bob"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
