use ltm_shared::payment::{PaymentEvent, PaymentEventKind};
use ltm_shared::UserRole;
use ltm_store::Database;
use tracing::info;

use crate::error::Result;
use crate::service::ChatService;
use crate::webhooks::{Applied, WorkflowOutcome, VIP_SOURCE};

impl ChatService {
    /// Grant the VIP role to the payer of a completed checkout. Other event
    /// types are ignored; cancellations do not revoke the role.
    pub fn handle_vip_event(&self, event: &PaymentEvent) -> Result<WorkflowOutcome> {
        match &event.kind {
            PaymentEventKind::CheckoutCompleted => {
                self.apply_once(event, VIP_SOURCE, |db| self.grant_vip(db, event))
            }
            PaymentEventKind::SubscriptionCancelled => Ok(WorkflowOutcome::Ignored {
                event_type: ltm_shared::constants::EVENT_SUBSCRIPTION_DELETED.to_string(),
            }),
            PaymentEventKind::Unsupported(event_type) => {
                info!(event_type, "ignoring vip event");
                Ok(WorkflowOutcome::Ignored {
                    event_type: event_type.clone(),
                })
            }
        }
    }

    fn grant_vip(&self, db: &Database, event: &PaymentEvent) -> Result<Applied> {
        let user = self.resolve_payer(db, event)?;
        if let Some(customer) = event.customer.as_deref() {
            self.link_customer(db, &user, customer)?;
        }

        match user.role {
            UserRole::User => {
                db.set_user_role(user.id, UserRole::Vip)?;
                info!(user_id = %user.user_id, "granted vip");
                Ok((WorkflowOutcome::Applied { groups: Vec::new() }, Vec::new()))
            }
            // Owners and lawyers keep their role.
            role => {
                info!(user_id = %user.user_id, role = %role, "vip not applied");
                Ok((WorkflowOutcome::Unchanged, Vec::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::testing::{service, signup};

    fn checkout(key: &str, subject: Option<&str>, customer: Option<&str>) -> PaymentEvent {
        PaymentEvent {
            key: key.into(),
            kind: PaymentEventKind::CheckoutCompleted,
            client_reference_id: subject.map(Into::into),
            customer: customer.map(Into::into),
        }
    }

    #[test]
    fn test_grants_vip_and_links_customer() {
        let svc = service();
        signup(&svc, "alice");

        let outcome = svc
            .handle_vip_event(&checkout("evt_1", Some("alice"), Some("cus_9")))
            .unwrap();
        assert!(matches!(outcome, WorkflowOutcome::Applied { .. }));

        let alice = svc.get_me("alice").unwrap();
        assert_eq!(alice.role, UserRole::Vip);
        assert_eq!(alice.billing_customer_ref.as_deref(), Some("cus_9"));

        assert_eq!(
            svc.handle_vip_event(&checkout("evt_1", Some("alice"), Some("cus_9")))
                .unwrap(),
            WorkflowOutcome::Duplicate
        );
        // Renewal by customer id alone.
        assert_eq!(
            svc.handle_vip_event(&checkout("evt_2", None, Some("cus_9"))).unwrap(),
            WorkflowOutcome::Unchanged
        );
    }

    #[test]
    fn test_owner_keeps_role() {
        let svc = service();
        let owner = signup(&svc, "owner");
        svc.db.set_user_role(owner.id, UserRole::Owner).unwrap();

        svc.handle_vip_event(&checkout("evt_1", Some("owner"), None)).unwrap();
        assert_eq!(svc.get_me("owner").unwrap().role, UserRole::Owner);
    }

    #[test]
    fn test_same_event_on_both_endpoints() {
        let svc = service();
        signup(&svc, "alice");
        let event = checkout("evt_1", Some("alice"), None);

        // No recent group, so the privilege endpoint rejects it...
        assert!(svc.handle_privilege_event(&event).is_err());
        // ...without blocking the vip grant for the same event id.
        assert!(matches!(
            svc.handle_vip_event(&event).unwrap(),
            WorkflowOutcome::Applied { .. }
        ));
    }

    #[test]
    fn test_unknown_payer() {
        let svc = service();
        assert!(matches!(
            svc.handle_vip_event(&checkout("evt_1", Some("ghost"), None)),
            Err(ChatError::NotFound("user"))
        ));
        assert!(matches!(
            svc.handle_vip_event(&checkout("evt_2", None, None)),
            Err(ChatError::MissingField(_))
        ));
    }
}
