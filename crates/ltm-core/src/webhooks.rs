//! Exactly-once application of payment provider events.

use ltm_shared::payment::PaymentEvent;
use ltm_store::{Database, UserIndex};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::feed::ChangeEvent;
use crate::service::ChatService;

/// Ledger source for the privilege endpoint.
pub const PRIVILEGE_SOURCE: &str = "privilege";
/// Ledger source for the VIP endpoint.
pub const VIP_SOURCE: &str = "vip";

/// What handling a webhook event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowOutcome {
    /// State changed. Lists the groups whose status changed, if any.
    Applied { groups: Vec<Uuid> },
    /// The event was valid but everything was already in the target state.
    Unchanged,
    /// The event was applied by an earlier delivery.
    Duplicate,
    /// The event type is not handled by this endpoint.
    Ignored { event_type: String },
}

pub(crate) type Applied = (WorkflowOutcome, Vec<ChangeEvent>);

impl ChatService {
    /// Run `apply` and record the event in the ledger, in one transaction.
    /// A failed `apply` leaves no trace so redelivery retries it.
    pub(crate) fn apply_once(
        &self,
        event: &PaymentEvent,
        source: &'static str,
        apply: impl FnOnce(&Database) -> Result<Applied>,
    ) -> Result<WorkflowOutcome> {
        // The same provider event may be routed to several endpoints.
        let ledger_key = format!("{source}:{}", event.key);

        let (outcome, changes) = self.db.transaction(|db| -> Result<Applied> {
            if !db.record_event(&ledger_key, source)? {
                return Ok((WorkflowOutcome::Duplicate, Vec::new()));
            }
            apply(db)
        })?;

        match &outcome {
            WorkflowOutcome::Duplicate => info!(key = %event.key, source, "event already applied"),
            _ => info!(key = %event.key, source, ?outcome, "event handled"),
        }
        self.feed.publish(changes);
        Ok(outcome)
    }

    /// Find the paying user: by billing customer first, then by identity
    /// subject.
    pub(crate) fn resolve_payer(&self, db: &Database, event: &PaymentEvent) -> Result<UserIndex> {
        if let Some(customer) = event.customer.as_deref() {
            if let Some(user) = db.find_user_by_customer_ref(customer)? {
                return Ok(user);
            }
        }
        match event.client_reference_id.as_deref() {
            Some(subject) => db
                .find_user_by_user_id(subject)?
                .ok_or(ChatError::NotFound("user")),
            None if event.customer.is_some() => Err(ChatError::NotFound("user")),
            None => Err(ChatError::MissingField("client_reference_id")),
        }
    }

    /// Remember `customer` as the user's billing customer. A customer id
    /// already linked to another profile is left alone.
    pub(crate) fn link_customer(&self, db: &Database, user: &UserIndex, customer: &str) -> Result<()> {
        if user.billing_customer_ref.as_deref() == Some(customer) {
            return Ok(());
        }
        if let Some(holder) = db.find_user_by_customer_ref(customer)? {
            if holder.id != user.id {
                warn!(
                    customer,
                    user_id = %user.user_id,
                    holder = %holder.user_id,
                    "billing customer already linked to another user"
                );
                return Ok(());
            }
        }
        db.set_user_customer_ref(user.id, customer)?;
        Ok(())
    }
}
