//! CRUD operations for [`GroupUser`] membership rows.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{enum_at, format_ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::GroupUser;

impl Database {
    /// Insert a membership. Fails with `Conflict` if the user is already a
    /// member of the group.
    pub fn insert_member(&self, member: &GroupUser) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_users (id, group_id, user_id, role, nickname, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                member.id.to_string(),
                member.group_id.to_string(),
                member.user_id,
                member.role.as_str(),
                member.nickname,
                member.email,
                format_ts(&member.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_member(&self, group_id: Uuid, user_id: &str) -> Result<Option<GroupUser>> {
        let member = self
            .conn()
            .query_row(
                "SELECT id, group_id, user_id, role, nickname, email, created_at
                 FROM group_users
                 WHERE group_id = ?1 AND user_id = ?2",
                params![group_id.to_string(), user_id],
                row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    /// Members of a group in join order.
    pub fn list_members(&self, group_id: Uuid) -> Result<Vec<GroupUser>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, user_id, role, nickname, email, created_at
             FROM group_users
             WHERE group_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![group_id.to_string()], row_to_member)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Every membership held by one identity subject.
    pub fn list_memberships_for_user(&self, user_id: &str) -> Result<Vec<GroupUser>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, user_id, role, nickname, email, created_at
             FROM group_users
             WHERE user_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_member)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Refresh the denormalized nickname on every membership of a user.
    /// Returns the number of rows touched.
    pub fn set_member_nickname_for_user(&self, user_id: &str, nickname: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE group_users SET nickname = ?1 WHERE user_id = ?2",
            params![nickname, user_id],
        )?;
        Ok(affected)
    }

    pub fn delete_member(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM group_users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupUser> {
    Ok(GroupUser {
        id: uuid_at(row, 0)?,
        group_id: uuid_at(row, 1)?,
        user_id: row.get(2)?,
        role: enum_at(row, 3)?,
        nickname: row.get(4)?,
        email: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{timestamp_now, Group};
    use ltm_shared::{ChatStatus, GroupRole};

    fn seed_group(db: &Database) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_group(&Group {
            id,
            name: "g".into(),
            url_slug: id.to_string(),
            admin_user_id: "u1".into(),
            chat_status: ChatStatus::Default,
            creator_ref: None,
            created_at: timestamp_now(),
        })
        .unwrap();
        id
    }

    fn member(group_id: Uuid, user_id: &str, role: GroupRole) -> GroupUser {
        GroupUser {
            id: Uuid::new_v4(),
            group_id,
            user_id: user_id.into(),
            role,
            nickname: format!("{user_id}-nick"),
            email: format!("{user_id}@example.com"),
            created_at: timestamp_now(),
        }
    }

    #[test]
    fn test_membership_unique_per_group() {
        let db = Database::open_in_memory().unwrap();
        let g = seed_group(&db);
        db.insert_member(&member(g, "u1", GroupRole::Admin)).unwrap();
        let err = db.insert_member(&member(g, "u1", GroupRole::Member)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_list_in_join_order() {
        let db = Database::open_in_memory().unwrap();
        let g = seed_group(&db);
        db.insert_member(&member(g, "u1", GroupRole::Admin)).unwrap();
        db.insert_member(&member(g, "u2", GroupRole::Member)).unwrap();
        db.insert_member(&member(g, "u3", GroupRole::Member)).unwrap();

        let ids: Vec<_> = db.list_members(g).unwrap().into_iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_nickname_fan_out() {
        let db = Database::open_in_memory().unwrap();
        let g1 = seed_group(&db);
        let g2 = seed_group(&db);
        db.insert_member(&member(g1, "u2", GroupRole::Member)).unwrap();
        db.insert_member(&member(g2, "u2", GroupRole::Member)).unwrap();
        db.insert_member(&member(g2, "u3", GroupRole::Member)).unwrap();

        assert_eq!(db.set_member_nickname_for_user("u2", "bobby").unwrap(), 2);
        for m in db.list_memberships_for_user("u2").unwrap() {
            assert_eq!(m.nickname, "bobby");
        }
        assert_eq!(db.find_member(g2, "u3").unwrap().unwrap().nickname, "u3-nick");
    }

    #[test]
    fn test_delete_member() {
        let db = Database::open_in_memory().unwrap();
        let g = seed_group(&db);
        let m = member(g, "u2", GroupRole::Member);
        db.insert_member(&m).unwrap();

        assert!(db.delete_member(m.id).unwrap());
        assert!(db.find_member(g, "u2").unwrap().is_none());
        assert!(!db.delete_member(m.id).unwrap());
    }
}
