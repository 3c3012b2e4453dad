use rusqlite::Connection;

// One row per external event whose side effects have been applied.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS processed_events (
    event_key    TEXT PRIMARY KEY NOT NULL,   -- provider event id or body hash
    source       TEXT NOT NULL,               -- handler that applied it
    processed_at TEXT NOT NULL                -- RFC-3339
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
