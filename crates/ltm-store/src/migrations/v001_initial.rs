//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `user_index`, `groups`, `group_users` and
//! `group_messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_index (
    id                   TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id              TEXT NOT NULL UNIQUE,        -- identity subject
    email                TEXT NOT NULL,
    nickname             TEXT NOT NULL,
    role                 TEXT NOT NULL DEFAULT 'User',
    recent_group         TEXT,
    photo_ref            TEXT,
    bio                  TEXT,
    locked_bio           TEXT,
    billing_customer_ref TEXT UNIQUE,
    created_at           TEXT NOT NULL                -- RFC-3339, UTC, micros
);

CREATE INDEX IF NOT EXISTS idx_user_index_email ON user_index(email COLLATE NOCASE);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id            TEXT PRIMARY KEY NOT NULL,          -- UUID v4
    name          TEXT NOT NULL,
    url_slug      TEXT NOT NULL UNIQUE,
    admin_user_id TEXT NOT NULL,                      -- identity subject
    chat_status   TEXT NOT NULL DEFAULT 'Default',
    creator_ref   TEXT,                               -- nullable FK -> user_index(id)
    created_at    TEXT NOT NULL,

    FOREIGN KEY (creator_ref) REFERENCES user_index(id) ON DELETE SET NULL
);

-- ----------------------------------------------------------------
-- Memberships
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_users (
    id         TEXT PRIMARY KEY NOT NULL,             -- UUID v4
    group_id   TEXT NOT NULL,                         -- FK -> groups(id)
    user_id    TEXT NOT NULL,                         -- identity subject
    role       TEXT NOT NULL,                         -- admin | member
    nickname   TEXT NOT NULL,
    email      TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_group_users_unique ON group_users(group_id, user_id);
CREATE INDEX IF NOT EXISTS idx_group_users_user ON group_users(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_messages (
    id             TEXT PRIMARY KEY NOT NULL,         -- UUID v4
    group_id       TEXT NOT NULL,                     -- FK -> groups(id)
    author_user_id TEXT,                              -- NULL for system messages
    kind           TEXT NOT NULL,                     -- text | image | system
    content        TEXT,
    image_ref      TEXT,
    nickname       TEXT NOT NULL,
    created_at     TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
    CHECK ((kind = 'system') = (author_user_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_group_messages_group_ts
    ON group_messages(group_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
