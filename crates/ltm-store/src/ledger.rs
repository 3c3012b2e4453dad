//! Ledger of external events whose side effects were applied.
//!
//! Recording the event key inside the same transaction as the side effects
//! turns at-least-once delivery into exactly-once application.

use rusqlite::{params, OptionalExtension};

use crate::codec::format_ts;
use crate::database::Database;
use crate::error::Result;
use crate::models::timestamp_now;

impl Database {
    /// Record an event key. Returns `false` if it was already recorded.
    pub fn record_event(&self, event_key: &str, source: &str) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO processed_events (event_key, source, processed_at)
             VALUES (?1, ?2, ?3)",
            params![event_key, source, format_ts(&timestamp_now())],
        )?;
        Ok(inserted > 0)
    }

    pub fn is_event_processed(&self, event_key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM processed_events WHERE event_key = ?1",
                params![event_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
