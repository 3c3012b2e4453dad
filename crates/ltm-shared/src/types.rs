use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UnknownVariant;

// Global role carried on a user's profile record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserRole {
    Owner,
    Lawyer,
    #[default]
    User,
    #[serde(rename = "VIP")]
    Vip,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Lawyer => "Lawyer",
            Self::User => "User",
            Self::Vip => "VIP",
        }
    }

    /// Owners may edit any profile, including role and locked bio.
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Owner" => Ok(Self::Owner),
            "Lawyer" => Ok(Self::Lawyer),
            "User" => Ok(Self::User),
            "VIP" => Ok(Self::Vip),
            other => Err(UnknownVariant {
                kind: "user role",
                value: other.to_string(),
            }),
        }
    }
}

/// Role of a membership row within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Rename, delete, add and remove members.
    pub fn can_manage_group(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for GroupRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(UnknownVariant {
                kind: "group role",
                value: other.to_string(),
            }),
        }
    }
}

/// Attorney-client privilege state of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChatStatus {
    #[default]
    Default,
    Activated,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Activated => "Activated",
        }
    }
}

impl FromStr for ChatStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(Self::Default),
            "Activated" => Ok(Self::Activated),
            other => Err(UnknownVariant {
                kind: "chat status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "system" => Ok(Self::System),
            other => Err(UnknownVariant {
                kind: "message type",
                value: other.to_string(),
            }),
        }
    }
}

macro_rules! impl_display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(UserRole, GroupRole, ChatStatus, MessageKind);

/// Resolve a "recent group" pointer to a group id.
///
/// Clients store either the bare group id or the full page URL
/// (`https://host/groups/<id>/...`). Returns `None` when no UUID can be
/// extracted.
pub fn parse_group_pointer(pointer: &str) -> Option<Uuid> {
    let pointer = pointer.trim();
    let candidate = match pointer.split_once("/groups/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or(""),
        None => pointer,
    };
    Uuid::parse_str(candidate).ok()
}
