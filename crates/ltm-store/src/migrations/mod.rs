//! Schema migrations, applied in order when a [`Database`] is opened.
//!
//! The `user_version` pragma records the last applied step, so each
//! migration runs once per database file.
//!
//! [`Database`]: crate::Database

pub mod v001_initial;
pub mod v002_event_ledger;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Every migration, indexed by the `user_version` it upgrades to.
const STEPS: &[(u32, &str, Step)] = &[
    (1, "v001_initial", v001_initial::up),
    (2, "v002_event_ledger", v002_event_ledger::up),
];

/// Schema version after all migrations have run.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    tracing::debug!(current, target = CURRENT_VERSION, "schema version");

    for &(version, name, up) in STEPS.iter().filter(|(v, _, _)| *v > current) {
        tracing::info!(version, name, "applying migration");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}
