//! User profiles: lazy creation, edits, roles and account deletion.

use ltm_shared::constants::{
    account_deleted_text, DEFAULT_PHOTO_REF, MAX_NICKNAME_CHARS, PROFILE_PICS_PREFIX,
    USER_SEARCH_LIMIT,
};
use ltm_shared::identity::IdentityClaims;
use ltm_shared::types::parse_group_pointer;
use ltm_shared::{GroupRole, UserRole};
use ltm_store::{timestamp_now, GroupMessage, StoreError, UserIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::{can_edit_profile, require_member, require_owner};
use crate::error::{missing, ChatError, Result};
use crate::feed::ChangeEvent;
use crate::service::ChatService;

/// The authenticated caller, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub nickname: String,
}

impl From<IdentityClaims> for Principal {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            nickname: claims.nickname,
        }
    }
}

/// Fields a user may change on a profile. `None` leaves a field untouched;
/// an empty bio clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub photo_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    /// Groups the user administered, deleted with the account.
    pub deleted_groups: Vec<Uuid>,
    /// Groups the user was removed from.
    pub left_groups: Vec<Uuid>,
}

impl ChatService {
    /// Return the caller's profile, creating it on first sight.
    pub fn ensure_user(&self, principal: &Principal) -> Result<UserIndex> {
        if principal.user_id.trim().is_empty() {
            return Err(ChatError::MissingField("sub"));
        }
        if let Some(user) = self.db.find_user_by_user_id(&principal.user_id)? {
            return Ok(user);
        }

        let user = UserIndex {
            id: Uuid::new_v4(),
            user_id: principal.user_id.clone(),
            email: principal.email.trim().to_string(),
            nickname: initial_nickname(principal),
            role: UserRole::User,
            recent_group: None,
            photo_ref: Some(DEFAULT_PHOTO_REF.to_string()),
            bio: None,
            locked_bio: None,
            billing_customer_ref: None,
            created_at: timestamp_now(),
        };

        match self.db.insert_user(&user) {
            Ok(()) => {
                info!(user_id = %user.user_id, "created user profile");
                Ok(user)
            }
            // Another request created it first.
            Err(StoreError::Conflict(_)) => self.current_user(&principal.user_id),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_me(&self, actor: &str) -> Result<UserIndex> {
        self.current_user(actor)
    }

    pub fn get_profile(&self, id: Uuid) -> Result<UserIndex> {
        self.db.get_user(id).map_err(missing("user"))
    }

    /// Apply `update` to the profile `target_id`. A nickname change is
    /// copied onto every membership row of that user.
    pub fn update_profile(&self, actor: &str, target_id: Uuid, update: ProfileUpdate) -> Result<UserIndex> {
        let editor = self.current_user(actor)?;
        let target = self.get_profile(target_id)?;
        if !can_edit_profile(&editor, &target) {
            return Err(ChatError::Forbidden("cannot edit another user's profile"));
        }

        let nickname = update.nickname.as_deref().map(validate_nickname).transpose()?;
        let photo_ref = update.photo_ref.as_deref().map(validate_photo_ref).transpose()?;
        let bio = update.bio.as_deref().map(str::trim);

        self.db.transaction(|db| -> Result<()> {
            if let Some(nickname) = &nickname {
                db.set_user_nickname(target.id, nickname)?;
                let rows = db.set_member_nickname_for_user(&target.user_id, nickname)?;
                debug!(user_id = %target.user_id, rows, "refreshed membership nicknames");
            }
            if let Some(bio) = bio {
                db.set_user_bio(target.id, (!bio.is_empty()).then_some(bio))?;
            }
            if let Some(photo_ref) = &photo_ref {
                db.set_user_photo(target.id, Some(photo_ref))?;
            }
            Ok(())
        })?;

        self.get_profile(target.id)
    }

    pub fn set_role(&self, actor: &str, target_id: Uuid, role: UserRole) -> Result<UserIndex> {
        require_owner(&self.current_user(actor)?)?;
        let target = self.get_profile(target_id)?;
        self.db.set_user_role(target.id, role)?;
        info!(user_id = %target.user_id, role = %role, "changed user role");
        self.get_profile(target.id)
    }

    pub fn set_locked_bio(&self, actor: &str, target_id: Uuid, locked_bio: Option<String>) -> Result<UserIndex> {
        require_owner(&self.current_user(actor)?)?;
        let target = self.get_profile(target_id)?;
        let locked_bio = locked_bio.as_deref().map(str::trim).filter(|b| !b.is_empty());
        self.db.set_user_locked_bio(target.id, locked_bio)?;
        self.get_profile(target.id)
    }

    /// Remember the group the user last opened. `pointer` may be a bare
    /// group id or a page URL containing `/groups/<id>`; it is stored as given.
    pub fn set_recent_group(&self, actor: &str, pointer: &str) -> Result<UserIndex> {
        let user = self.current_user(actor)?;
        let pointer = pointer.trim();
        if pointer.is_empty() {
            return Err(ChatError::MissingField("recentGroup"));
        }
        let group_id = parse_group_pointer(pointer)
            .ok_or_else(|| ChatError::BadReference(format!("no group id in {pointer:?}")))?;
        require_member(&self.db, group_id, actor)?;

        self.db.set_user_recent_group(user.id, Some(pointer))?;
        self.get_profile(user.id)
    }

    /// Delete the caller's account. Groups they administer are deleted;
    /// in every other group their membership is removed with an
    /// announcement.
    pub fn delete_account(&self, actor: &str) -> Result<AccountDeletion> {
        let user = self.current_user(actor)?;
        let memberships = self.db.list_memberships_for_user(actor)?;

        let (report, changes) = self.db.transaction(|db| -> Result<_> {
            let mut report = AccountDeletion::default();
            let mut changes = Vec::new();

            for membership in &memberships {
                let group_id = membership.group_id;
                if membership.role == GroupRole::Admin {
                    let member_user_ids = db
                        .list_members(group_id)?
                        .into_iter()
                        .map(|m| m.user_id)
                        .collect();
                    db.delete_group(group_id)?;
                    changes.push(ChangeEvent::GroupDeleted {
                        group_id,
                        member_user_ids,
                    });
                    report.deleted_groups.push(group_id);
                } else {
                    db.delete_member(membership.id)?;
                    let notice = GroupMessage::system(group_id, account_deleted_text(&user.nickname));
                    db.insert_message(&notice)?;
                    changes.push(ChangeEvent::MemberRemoved {
                        group_id,
                        user_id: user.user_id.clone(),
                    });
                    changes.push(ChangeEvent::MessageCreated { message: notice });
                    report.left_groups.push(group_id);
                }
            }

            db.delete_user(user.id)?;
            Ok((report, changes))
        })?;

        info!(
            user_id = %user.user_id,
            deleted = report.deleted_groups.len(),
            left = report.left_groups.len(),
            "deleted account"
        );
        self.feed.publish(changes);
        Ok(report)
    }

    /// Profiles whose nickname starts with `query`, at most ten.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserIndex>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::MissingField("query"));
        }
        Ok(self.db.search_users_by_nickname(query, USER_SEARCH_LIMIT)?)
    }
}

fn initial_nickname(principal: &Principal) -> String {
    let nickname = principal.nickname.trim();
    if !nickname.is_empty() {
        return nickname.chars().take(MAX_NICKNAME_CHARS).collect();
    }
    match principal.email.split('@').next().map(str::trim) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => principal.user_id.clone(),
    }
}

fn validate_nickname(raw: &str) -> Result<String> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(ChatError::MissingField("nickname"));
    }
    if nickname.chars().count() > MAX_NICKNAME_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "nickname exceeds {MAX_NICKNAME_CHARS} characters"
        )));
    }
    Ok(nickname.to_string())
}

fn validate_photo_ref(raw: &str) -> Result<String> {
    let photo_ref = raw.trim();
    let uploaded = photo_ref
        .strip_prefix(PROFILE_PICS_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty());
    if uploaded || photo_ref == DEFAULT_PHOTO_REF {
        Ok(photo_ref.to_string())
    } else {
        Err(ChatError::BadReference(format!(
            "photo must be stored under {PROFILE_PICS_PREFIX}/"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{principal, service, signup};
    use ltm_shared::ChatStatus;

    #[test]
    fn test_ensure_user_creates_once() {
        let svc = service();
        let first = svc.ensure_user(&principal("alice")).unwrap();
        assert_eq!(first.role, UserRole::User);
        assert_eq!(first.photo_ref.as_deref(), Some(DEFAULT_PHOTO_REF));
        assert_eq!(first.nickname, "alice");

        let again = svc.ensure_user(&principal("alice")).unwrap();
        assert_eq!(again.id, first.id);
    }

    #[test]
    fn test_nickname_falls_back_to_email() {
        let svc = service();
        let user = svc
            .ensure_user(&Principal {
                user_id: "sub-1".into(),
                email: "carol@example.com".into(),
                nickname: "  ".into(),
            })
            .unwrap();
        assert_eq!(user.nickname, "carol");
    }

    #[test]
    fn test_nickname_change_reaches_memberships() {
        let svc = service();
        let alice = signup(&svc, "alice");
        signup(&svc, "bob");
        let created = svc
            .create_group("alice", "Trip", &["bob@example.com".to_string()])
            .unwrap();

        let updated = svc
            .update_profile(
                "alice",
                alice.id,
                ProfileUpdate {
                    nickname: Some("  Ally ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.nickname, "Ally");

        let member = svc
            .db
            .find_member(created.group.id, "alice")
            .unwrap()
            .unwrap();
        assert_eq!(member.nickname, "Ally");
    }

    #[test]
    fn test_only_self_or_owner_may_edit() {
        let svc = service();
        let alice = signup(&svc, "alice");
        signup(&svc, "bob");

        let bio = ProfileUpdate {
            bio: Some("hello".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_profile("bob", alice.id, bio.clone()),
            Err(ChatError::Forbidden(_))
        ));

        let owner = signup(&svc, "owner");
        svc.db.set_user_role(owner.id, UserRole::Owner).unwrap();
        let edited = svc.update_profile("owner", alice.id, bio).unwrap();
        assert_eq!(edited.bio.as_deref(), Some("hello"));

        let cleared = svc
            .update_profile(
                "alice",
                alice.id,
                ProfileUpdate {
                    bio: Some(" ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.bio, None);
    }

    #[test]
    fn test_photo_must_be_profile_pic() {
        let svc = service();
        let alice = signup(&svc, "alice");
        let update = |photo: &str| ProfileUpdate {
            photo_ref: Some(photo.into()),
            ..Default::default()
        };

        assert!(matches!(
            svc.update_profile("alice", alice.id, update("chat-pics/x.webp")),
            Err(ChatError::BadReference(_))
        ));
        let ok = svc
            .update_profile("alice", alice.id, update("profile-pics/a.webp"))
            .unwrap();
        assert_eq!(ok.photo_ref.as_deref(), Some("profile-pics/a.webp"));
    }

    #[test]
    fn test_role_and_locked_bio_are_owner_only() {
        let svc = service();
        let alice = signup(&svc, "alice");
        let owner = signup(&svc, "owner");

        assert!(matches!(
            svc.set_role("alice", alice.id, UserRole::Vip),
            Err(ChatError::Forbidden(_))
        ));
        assert!(svc.set_locked_bio("alice", alice.id, Some("x".into())).is_err());

        svc.db.set_user_role(owner.id, UserRole::Owner).unwrap();
        let promoted = svc.set_role("owner", alice.id, UserRole::Lawyer).unwrap();
        assert_eq!(promoted.role, UserRole::Lawyer);
        let locked = svc
            .set_locked_bio("owner", alice.id, Some("Verified attorney".into()))
            .unwrap();
        assert_eq!(locked.locked_bio.as_deref(), Some("Verified attorney"));
    }

    #[test]
    fn test_recent_group_requires_membership() {
        let svc = service();
        signup(&svc, "alice");
        signup(&svc, "bob");
        let group = svc.create_group("alice", "Trip", &[]).unwrap().group;

        let url = format!("https://app.example.com/groups/{}", group.id);
        let user = svc.set_recent_group("alice", &url).unwrap();
        assert_eq!(user.recent_group.as_deref(), Some(url.as_str()));

        assert!(matches!(
            svc.set_recent_group("bob", &url),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            svc.set_recent_group("alice", "not-a-group"),
            Err(ChatError::BadReference(_))
        ));
    }

    #[test]
    fn test_delete_account_cascades() {
        let svc = service();
        signup(&svc, "alice");
        let bob = signup(&svc, "bob");
        let owned = svc
            .create_group("bob", "Bob's", &["alice@example.com".to_string()])
            .unwrap()
            .group;
        let joined = svc
            .create_group("alice", "Alice's", &["bob@example.com".to_string()])
            .unwrap()
            .group;

        let report = svc.delete_account("bob").unwrap();
        assert_eq!(report.deleted_groups, vec![owned.id]);
        assert_eq!(report.left_groups, vec![joined.id]);

        assert!(matches!(svc.db.get_group(owned.id), Err(StoreError::NotFound)));
        assert!(svc.db.find_member(joined.id, "bob").unwrap().is_none());
        let last = svc.db.list_messages_for_group(joined.id).unwrap().pop().unwrap();
        assert_eq!(last.content.as_deref(), Some("bob has deleted their account."));
        assert!(matches!(svc.db.get_user(bob.id), Err(StoreError::NotFound)));
        assert_eq!(svc.db.get_group(joined.id).unwrap().chat_status, ChatStatus::Default);
    }

    #[test]
    fn test_search_users() {
        let svc = service();
        for name in ["anna", "andrew", "bob"] {
            signup(&svc, name);
        }
        let found: Vec<_> = svc
            .search_users("an")
            .unwrap()
            .into_iter()
            .map(|u| u.nickname)
            .collect();
        assert_eq!(found, vec!["andrew", "anna"]);
        assert!(matches!(svc.search_users(" "), Err(ChatError::MissingField("query"))));
    }
}
