//! Attorney-client privilege state machine.
//!
//! A group moves `Default -> Activated` when its admin completes checkout
//! and back to `Default` when the subscription is cancelled. Activation
//! announces itself and seats the designated lawyer; deactivation
//! announces itself and removes the lawyer.

use ltm_shared::constants::{PRIVILEGE_ACTIVATED_TEXT, PRIVILEGE_DEACTIVATED_TEXT};
use ltm_shared::payment::{PaymentEvent, PaymentEventKind};
use ltm_shared::types::parse_group_pointer;
use ltm_shared::{ChatStatus, GroupRole, MessageKind};
use ltm_store::{timestamp_now, Database, GroupMessage, GroupUser};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::require_admin;
use crate::error::{missing, ChatError, Result};
use crate::feed::ChangeEvent;
use crate::service::ChatService;
use crate::webhooks::{Applied, WorkflowOutcome, PRIVILEGE_SOURCE};

impl ChatService {
    pub fn handle_privilege_event(&self, event: &PaymentEvent) -> Result<WorkflowOutcome> {
        match &event.kind {
            PaymentEventKind::CheckoutCompleted => {
                self.apply_once(event, PRIVILEGE_SOURCE, |db| self.activate(db, event))
            }
            PaymentEventKind::SubscriptionCancelled => {
                self.apply_once(event, PRIVILEGE_SOURCE, |db| self.deactivate(db, event))
            }
            PaymentEventKind::Unsupported(event_type) => {
                info!(event_type, "ignoring privilege event");
                Ok(WorkflowOutcome::Ignored {
                    event_type: event_type.clone(),
                })
            }
        }
    }

    /// Activate privilege on the payer's most recently opened group.
    fn activate(&self, db: &Database, event: &PaymentEvent) -> Result<Applied> {
        let subject = event
            .client_reference_id
            .as_deref()
            .ok_or(ChatError::MissingField("client_reference_id"))?;
        let payer = db
            .find_user_by_user_id(subject)?
            .ok_or(ChatError::NotFound("user"))?;
        if let Some(customer) = event.customer.as_deref() {
            self.link_customer(db, &payer, customer)?;
        }

        let pointer = payer
            .recent_group
            .as_deref()
            .ok_or_else(|| ChatError::BadReference("user has no recent group".into()))?;
        let group_id = parse_group_pointer(pointer)
            .ok_or_else(|| ChatError::BadReference(format!("no group id in {pointer:?}")))?;
        let group = db.get_group(group_id).map_err(missing("group"))?;
        // Limited to groups the payer administers, mirroring deactivation.
        require_admin(db, group.id, &payer.user_id)?;

        if group.chat_status == ChatStatus::Activated {
            info!(group_id = %group.id, "privilege already active");
            return Ok((WorkflowOutcome::Unchanged, Vec::new()));
        }

        db.set_chat_status(group.id, ChatStatus::Activated)?;
        let mut changes = Vec::new();
        let notice = GroupMessage::system(group.id, PRIVILEGE_ACTIVATED_TEXT);
        db.insert_message(&notice)?;
        changes.push(ChangeEvent::MessageCreated { message: notice });

        match self.config.lawyer_user_id.as_deref() {
            Some(lawyer_id) => self.seat_lawyer(db, group.id, lawyer_id, &mut changes)?,
            None => warn!(group_id = %group.id, "no lawyer configured, activating without one"),
        }

        changes.push(ChangeEvent::GroupUpdated {
            group: db.get_group(group.id)?,
        });
        info!(group_id = %group.id, payer = %payer.user_id, "privilege activated");
        Ok((WorkflowOutcome::Applied { groups: vec![group.id] }, changes))
    }

    /// Add the lawyer to the group if absent and post their introduction.
    fn seat_lawyer(&self, db: &Database, group_id: Uuid, lawyer_id: &str, changes: &mut Vec<ChangeEvent>) -> Result<()> {
        let profile = db.find_user_by_user_id(lawyer_id)?;
        let nickname = profile
            .as_ref()
            .map_or_else(|| self.config.lawyer_nickname.clone(), |p| p.nickname.clone());

        if db.find_member(group_id, lawyer_id)?.is_none() {
            let seat = GroupUser {
                id: Uuid::new_v4(),
                group_id,
                user_id: lawyer_id.to_string(),
                role: GroupRole::Member,
                nickname: nickname.clone(),
                email: profile.map(|p| p.email).unwrap_or_default(),
                created_at: timestamp_now(),
            };
            db.insert_member(&seat)?;
            changes.push(ChangeEvent::MemberAdded { member: seat });
        }

        let intro = GroupMessage {
            id: Uuid::new_v4(),
            group_id,
            author_user_id: Some(lawyer_id.to_string()),
            kind: MessageKind::Text,
            content: Some(self.config.lawyer_intro.clone()),
            image_ref: None,
            nickname,
            created_at: timestamp_now(),
        };
        db.insert_message(&intro)?;
        changes.push(ChangeEvent::MessageCreated { message: intro });
        Ok(())
    }

    /// Deactivate privilege on every activated group the payer administers.
    fn deactivate(&self, db: &Database, event: &PaymentEvent) -> Result<Applied> {
        let payer = self.resolve_payer(db, event)?;
        let mut groups = Vec::new();
        let mut changes = Vec::new();

        for membership in db.list_memberships_for_user(&payer.user_id)? {
            if membership.role != GroupRole::Admin {
                continue;
            }
            let group_id = membership.group_id;
            if !db.set_chat_status(group_id, ChatStatus::Default)? {
                continue;
            }

            let notice = GroupMessage::system(group_id, PRIVILEGE_DEACTIVATED_TEXT);
            db.insert_message(&notice)?;
            changes.push(ChangeEvent::MessageCreated { message: notice });

            if let Some(lawyer_id) = self.config.lawyer_user_id.as_deref() {
                if let Some(seat) = db.find_member(group_id, lawyer_id)? {
                    db.delete_member(seat.id)?;
                    changes.push(ChangeEvent::MemberRemoved {
                        group_id,
                        user_id: lawyer_id.to_string(),
                    });
                }
            }

            changes.push(ChangeEvent::GroupUpdated {
                group: db.get_group(group_id)?,
            });
            groups.push(group_id);
        }

        if groups.is_empty() {
            info!(payer = %payer.user_id, "no activated groups to deactivate");
            return Ok((WorkflowOutcome::Unchanged, changes));
        }
        info!(payer = %payer.user_id, groups = groups.len(), "privilege deactivated");
        Ok((WorkflowOutcome::Applied { groups }, changes))
    }
}
