//! Inbound payment provider webhook payloads.
//!
//! Only two event shapes drive business logic: a completed checkout and a
//! cancelled subscription. Both carry the paying user's identity subject in
//! `data.object.client_reference_id` and/or a billing customer id in
//! `data.object.customer`. Events forwarded through an event bus arrive
//! wrapped in a `detail` envelope.

use serde::Deserialize;

use crate::constants::{EVENT_CHECKOUT_COMPLETED, EVENT_SUBSCRIPTION_DELETED};
use crate::error::PaymentEventError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    CheckoutCompleted,
    SubscriptionCancelled,
    Unsupported(String),
}

/// A parsed payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Deduplication key: the provider's event id, or the BLAKE3 hash of
    /// the raw body when the provider sent none.
    pub key: String,
    pub kind: PaymentEventKind,
    /// Identity subject of the paying user.
    pub client_reference_id: Option<String>,
    /// Billing customer id.
    pub customer: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<RawData>,
    detail: Option<Box<RawEvent>>,
}

#[derive(Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Deserialize, Default)]
struct RawObject {
    client_reference_id: Option<String>,
    // Either a plain id or an expanded customer object.
    customer: Option<serde_json::Value>,
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize, Default)]
struct RawMetadata {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl PaymentEvent {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentEventError> {
        let mut raw: RawEvent = serde_json::from_slice(body)?;
        if let Some(inner) = raw.detail.take() {
            raw = *inner;
        }

        let event_type = raw
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or(PaymentEventError::MissingField("type"))?;

        let kind = match event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => PaymentEventKind::CheckoutCompleted,
            EVENT_SUBSCRIPTION_DELETED => PaymentEventKind::SubscriptionCancelled,
            _ => PaymentEventKind::Unsupported(event_type),
        };

        let object = raw.data.map(|d| d.object).unwrap_or_default();

        let client_reference_id = object
            .client_reference_id
            .or_else(|| object.metadata.and_then(|m| m.user_id))
            .and_then(non_empty);

        let customer = object.customer.and_then(|c| match c {
            serde_json::Value::String(s) => non_empty(s),
            serde_json::Value::Object(map) => map
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .and_then(non_empty),
            _ => None,
        });

        let key = match raw.id.and_then(non_empty) {
            Some(id) => id,
            None => blake3::hash(body).to_hex().to_string(),
        };

        Ok(Self {
            key,
            kind,
            client_reference_id,
            customer,
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
