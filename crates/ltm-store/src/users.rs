//! CRUD operations for [`UserIndex`] records.

use ltm_shared::UserRole;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{enum_at, format_ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::UserIndex;

const USER_COLUMNS: &str = "id, user_id, email, nickname, role, recent_group, photo_ref, bio, \
                            locked_bio, billing_customer_ref, created_at";

/// Profile columns that can be overwritten one at a time.
#[derive(Debug, Clone, Copy)]
enum UserColumn {
    Nickname,
    Bio,
    LockedBio,
    PhotoRef,
    RecentGroup,
    BillingCustomerRef,
}

impl UserColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Nickname => "nickname",
            Self::Bio => "bio",
            Self::LockedBio => "locked_bio",
            Self::PhotoRef => "photo_ref",
            Self::RecentGroup => "recent_group",
            Self::BillingCustomerRef => "billing_customer_ref",
        }
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new profile. Fails with `Conflict` if the identity subject
    /// already has one.
    pub fn insert_user(&self, user: &UserIndex) -> Result<()> {
        self.conn().execute(
            "INSERT INTO user_index (id, user_id, email, nickname, role, recent_group, photo_ref,
                                     bio, locked_bio, billing_customer_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                user.id.to_string(),
                user.user_id,
                user.email,
                user.nickname,
                user.role.as_str(),
                user.recent_group,
                user.photo_ref,
                user.bio,
                user.locked_bio,
                user.billing_customer_ref,
                format_ts(&user.created_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a profile by record key.
    pub fn get_user(&self, id: Uuid) -> Result<UserIndex> {
        let user = self.conn().query_row(
            &format!("SELECT {USER_COLUMNS} FROM user_index WHERE id = ?1"),
            params![id.to_string()],
            row_to_user,
        )?;
        Ok(user)
    }

    /// Look up a profile by identity subject.
    pub fn find_user_by_user_id(&self, user_id: &str) -> Result<Option<UserIndex>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user_index WHERE user_id = ?1"),
                params![user_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a profile by email, ignoring case. Returns the oldest match.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserIndex>> {
        let user = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM user_index
                     WHERE email = ?1 COLLATE NOCASE
                     ORDER BY created_at ASC LIMIT 1"
                ),
                params![email.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a profile by billing customer reference.
    pub fn find_user_by_customer_ref(&self, customer_ref: &str) -> Result<Option<UserIndex>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user_index WHERE billing_customer_ref = ?1"),
                params![customer_ref],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Profiles whose nickname starts with `prefix` (case-insensitive),
    /// ordered by nickname.
    pub fn search_users_by_nickname(&self, prefix: &str, limit: usize) -> Result<Vec<UserIndex>> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user_index
             WHERE nickname LIKE ?1 ESCAPE '\\'
             ORDER BY nickname ASC
             LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn set_user_nickname(&self, id: Uuid, nickname: &str) -> Result<bool> {
        self.set_user_column(id, UserColumn::Nickname, Some(nickname))
    }

    pub fn set_user_bio(&self, id: Uuid, bio: Option<&str>) -> Result<bool> {
        self.set_user_column(id, UserColumn::Bio, bio)
    }

    pub fn set_user_locked_bio(&self, id: Uuid, locked_bio: Option<&str>) -> Result<bool> {
        self.set_user_column(id, UserColumn::LockedBio, locked_bio)
    }

    pub fn set_user_photo(&self, id: Uuid, photo_ref: Option<&str>) -> Result<bool> {
        self.set_user_column(id, UserColumn::PhotoRef, photo_ref)
    }

    pub fn set_user_recent_group(&self, id: Uuid, pointer: Option<&str>) -> Result<bool> {
        self.set_user_column(id, UserColumn::RecentGroup, pointer)
    }

    pub fn set_user_customer_ref(&self, id: Uuid, customer_ref: &str) -> Result<bool> {
        self.set_user_column(id, UserColumn::BillingCustomerRef, Some(customer_ref))
    }

    pub fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE user_index SET role = ?1 WHERE id = ?2",
            params![role.as_str(), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    fn set_user_column(&self, id: Uuid, column: UserColumn, value: Option<&str>) -> Result<bool> {
        let affected = self.conn().execute(
            &format!("UPDATE user_index SET {} = ?1 WHERE id = ?2", column.name()),
            params![value, id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a profile.  Returns `true` if a row was deleted.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM user_index WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`UserIndex`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserIndex> {
    Ok(UserIndex {
        id: uuid_at(row, 0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        nickname: row.get(3)?,
        role: enum_at(row, 4)?,
        recent_group: row.get(5)?,
        photo_ref: row.get(6)?,
        bio: row.get(7)?,
        locked_bio: row.get(8)?,
        billing_customer_ref: row.get(9)?,
        created_at: ts_at(row, 10)?,
    })
}
