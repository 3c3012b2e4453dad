//! # ltm-core
//!
//! Business rules of the LTM group chat backend: group membership,
//! messaging, user profiles and the payment-driven privilege and VIP
//! workflows. Everything goes through [`ChatService`], which owns the
//! database handle and publishes committed changes on a [`ChangeFeed`].

pub mod access;
pub mod config;
pub mod error;
pub mod feed;
pub mod membership;
pub mod messaging;
pub mod privilege;
pub mod profiles;
pub mod service;
pub mod vip;
pub mod webhooks;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod scenarios;

pub use config::WorkflowConfig;
pub use error::{ChatError, Result};
pub use feed::{ChangeEvent, ChangeFeed};
pub use membership::{AddMembersReport, CreatedGroup};
pub use messaging::NewMessage;
pub use profiles::{AccountDeletion, Principal, ProfileUpdate};
pub use service::ChatService;
pub use webhooks::WorkflowOutcome;
