use rusqlite::params;
use uuid::Uuid;

use crate::codec::{enum_at, format_ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::GroupMessage;

impl Database {
    pub fn insert_message(&self, message: &GroupMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_messages (id, group_id, author_user_id, kind, content, image_ref,
                                         nickname, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.to_string(),
                message.group_id.to_string(),
                message.author_user_id,
                message.kind.as_str(),
                message.content,
                message.image_ref,
                message.nickname,
                format_ts(&message.created_at),
            ],
        )?;
        Ok(())
    }

    /// Messages of a group in creation order. Rows created within the same
    /// microsecond keep their insertion order.
    pub fn list_messages_for_group(&self, group_id: Uuid) -> Result<Vec<GroupMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, author_user_id, kind, content, image_ref, nickname, created_at
             FROM group_messages
             WHERE group_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![group_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMessage> {
    Ok(GroupMessage {
        id: uuid_at(row, 0)?,
        group_id: uuid_at(row, 1)?,
        author_user_id: row.get(2)?,
        kind: enum_at(row, 3)?,
        content: row.get(4)?,
        image_ref: row.get(5)?,
        nickname: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}
