//! # ltm-shared
//!
//! Types shared by every LTM crate: role and status enums, identity tokens
//! issued by the identity provider, inbound payment webhook payloads and
//! the string constants used in system messages.

pub mod constants;
pub mod error;
pub mod identity;
pub mod payment;
pub mod types;

pub use error::{IdentityError, PaymentEventError, UnknownVariant};
pub use types::{ChatStatus, GroupRole, MessageKind, UserRole};
