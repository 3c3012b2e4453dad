//! Posting and listing group messages.

use ltm_shared::constants::{CHAT_PICS_PREFIX, MAX_MESSAGE_CHARS};
use ltm_shared::MessageKind;
use ltm_store::{timestamp_now, GroupMessage};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::access::require_member;
use crate::error::{ChatError, Result};
use crate::feed::ChangeEvent;
use crate::service::ChatService;

/// A message as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl NewMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            content: Some(content.into()),
            image_ref: None,
        }
    }

    pub fn image(image_ref: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind: MessageKind::Image,
            content: caption,
            image_ref: Some(image_ref.into()),
        }
    }
}

impl ChatService {
    /// Post a message as `actor`. The stored nickname is the author's
    /// current profile nickname.
    pub fn post_message(&self, actor: &str, group_id: Uuid, message: NewMessage) -> Result<GroupMessage> {
        let (_, membership) = require_member(&self.db, group_id, actor)?;

        let (content, image_ref) = match message.kind {
            MessageKind::System => {
                return Err(ChatError::InvalidInput(
                    "system messages cannot be posted by clients".into(),
                ))
            }
            MessageKind::Text => {
                let text = message
                    .content
                    .as_deref()
                    .and_then(non_blank)
                    .ok_or(ChatError::MissingField("content"))?;
                (Some(check_length(text)?), None)
            }
            MessageKind::Image => {
                let image_ref = message
                    .image_ref
                    .as_deref()
                    .and_then(non_blank)
                    .ok_or(ChatError::MissingField("imageRef"))?;
                let caption = message
                    .content
                    .as_deref()
                    .and_then(non_blank)
                    .map(check_length)
                    .transpose()?;
                (caption, Some(validate_image_ref(image_ref)?))
            }
        };

        let nickname = self
            .db
            .find_user_by_user_id(actor)?
            .map_or(membership.nickname, |p| p.nickname);

        let stored = GroupMessage {
            id: Uuid::new_v4(),
            group_id,
            author_user_id: Some(actor.to_string()),
            kind: message.kind,
            content,
            image_ref,
            nickname,
            created_at: timestamp_now(),
        };
        self.db.insert_message(&stored)?;

        debug!(group_id = %group_id, message_id = %stored.id, kind = %stored.kind, "posted message");
        self.feed.publish([ChangeEvent::MessageCreated {
            message: stored.clone(),
        }]);
        Ok(stored)
    }

    /// Messages of a group in the order they were created.
    pub fn list_messages(&self, actor: &str, group_id: Uuid) -> Result<Vec<GroupMessage>> {
        require_member(&self.db, group_id, actor)?;
        Ok(self.db.list_messages_for_group(group_id)?)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn check_length(text: &str) -> Result<String> {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(text.to_string())
}

fn validate_image_ref(image_ref: &str) -> Result<String> {
    match image_ref
        .strip_prefix(CHAT_PICS_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(name) if !name.is_empty() && !name.contains("..") => Ok(image_ref.to_string()),
        _ => Err(ChatError::BadReference(format!(
            "image must be stored under {CHAT_PICS_PREFIX}/"
        ))),
    }
}
