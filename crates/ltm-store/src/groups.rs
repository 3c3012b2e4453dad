//! CRUD operations for [`Group`] records.

use ltm_shared::ChatStatus;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{enum_at, format_ts, opt_uuid_at, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::Group;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new group.
    pub fn insert_group(&self, group: &Group) -> Result<()> {
        self.conn().execute(
            "INSERT INTO groups (id, name, url_slug, admin_user_id, chat_status, creator_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                group.id.to_string(),
                group.name,
                group.url_slug,
                group.admin_user_id,
                group.chat_status.as_str(),
                group.creator_ref.map(|c| c.to_string()),
                format_ts(&group.created_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single group by UUID.
    pub fn get_group(&self, id: Uuid) -> Result<Group> {
        let group = self.conn().query_row(
            "SELECT id, name, url_slug, admin_user_id, chat_status, creator_ref, created_at
             FROM groups
             WHERE id = ?1",
            params![id.to_string()],
            row_to_group,
        )?;
        Ok(group)
    }

    /// Look up a group through its unique slug.
    pub fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let group = self
            .conn()
            .query_row(
                "SELECT id, name, url_slug, admin_user_id, chat_status, creator_ref, created_at
                 FROM groups
                 WHERE url_slug = ?1",
                params![slug],
                row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    /// Groups the given identity subject belongs to, newest first.
    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.url_slug, g.admin_user_id, g.chat_status, g.creator_ref, g.created_at
             FROM groups g
             JOIN group_users gu ON gu.group_id = g.id
             WHERE gu.user_id = ?1
             ORDER BY g.created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn set_group_name(&self, id: Uuid, name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE groups SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Set the privilege status. Returns `true` only if the stored value
    /// actually changed.
    pub fn set_chat_status(&self, id: Uuid, status: ChatStatus) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE groups SET chat_status = ?1 WHERE id = ?2 AND chat_status <> ?1",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    // ON DELETE CASCADE: memberships + messages go with it
    pub fn delete_group(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM groups WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        url_slug: row.get(2)?,
        admin_user_id: row.get(3)?,
        chat_status: enum_at(row, 4)?,
        creator_ref: opt_uuid_at(row, 5)?,
        created_at: ts_at(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{timestamp_now, GroupMessage, GroupUser};
    use ltm_shared::GroupRole;

    fn group(admin: &str) -> Group {
        let id = Uuid::new_v4();
        Group {
            id,
            name: "Book Club".into(),
            url_slug: id.to_string(),
            admin_user_id: admin.into(),
            chat_status: ChatStatus::Default,
            creator_ref: None,
            created_at: timestamp_now(),
        }
    }

    #[test]
    fn test_insert_get_and_slug() {
        let db = Database::open_in_memory().unwrap();
        let g = group("u1");
        db.insert_group(&g).unwrap();

        assert_eq!(db.get_group(g.id).unwrap(), g);
        assert_eq!(db.find_group_by_slug(&g.url_slug).unwrap(), Some(g.clone()));
        assert_eq!(db.find_group_by_slug("missing").unwrap(), None);
        assert!(matches!(db.get_group(Uuid::new_v4()), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_slug_is_unique() {
        let db = Database::open_in_memory().unwrap();
        let a = group("u1");
        let mut b = group("u1");
        b.url_slug = a.url_slug.clone();
        db.insert_group(&a).unwrap();
        assert!(matches!(db.insert_group(&b), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_set_chat_status_reports_change() {
        let db = Database::open_in_memory().unwrap();
        let g = group("u1");
        db.insert_group(&g).unwrap();

        assert!(db.set_chat_status(g.id, ChatStatus::Activated).unwrap());
        assert!(!db.set_chat_status(g.id, ChatStatus::Activated).unwrap());
        assert_eq!(db.get_group(g.id).unwrap().chat_status, ChatStatus::Activated);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let g = group("u1");
        db.insert_group(&g).unwrap();
        db.insert_member(&GroupUser {
            id: Uuid::new_v4(),
            group_id: g.id,
            user_id: "u1".into(),
            role: GroupRole::Admin,
            nickname: "alice".into(),
            email: "a@example.com".into(),
            created_at: timestamp_now(),
        })
        .unwrap();
        db.insert_message(&GroupMessage::system(g.id, "hello")).unwrap();

        assert!(db.delete_group(g.id).unwrap());
        assert!(db.list_members(g.id).unwrap().is_empty());
        assert!(db.list_messages_for_group(g.id).unwrap().is_empty());
        assert!(db.list_groups_for_user("u1").unwrap().is_empty());
    }
}
