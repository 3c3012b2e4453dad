//! # ltm-store
//!
//! SQLite persistence for the LTM group chat backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! record: user profiles, groups, memberships, messages and the ledger of
//! already-applied external events.

pub mod database;
pub mod groups;
pub mod ledger;
pub mod members;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod codec;
mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
