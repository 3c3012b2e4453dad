//! Server-Sent Event streams over the change feed.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::{self, Stream};
use ltm_core::ChangeEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use uuid::Uuid;

/// What a subscription does with one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Skip,
    Send,
    /// Send, then end the stream.
    SendAndClose,
}

/// Changes to one group, as seen by `user_id`. The stream ends when the
/// user leaves or the group is deleted.
pub fn group_filter(group_id: Uuid, user_id: String) -> impl Fn(&ChangeEvent) -> Delivery + Send + 'static {
    move |change| {
        if change.group_id() != group_id {
            return Delivery::Skip;
        }
        match change {
            ChangeEvent::GroupDeleted { .. } => Delivery::SendAndClose,
            ChangeEvent::MemberRemoved { user_id: removed, .. } if *removed == user_id => {
                Delivery::SendAndClose
            }
            _ => Delivery::Send,
        }
    }
}

/// Membership changes of `user_id` across all groups.
pub fn user_filter(user_id: String) -> impl Fn(&ChangeEvent) -> Delivery + Send + 'static {
    move |change| {
        if change.concerns_user(&user_id) {
            Delivery::Send
        } else {
            Delivery::Skip
        }
    }
}

pub fn change_stream<F>(
    rx: broadcast::Receiver<ChangeEvent>,
    filter: F,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    F: Fn(&ChangeEvent) -> Delivery + Send + 'static,
{
    stream::unfold(Some((rx, filter)), |state| async move {
        let (mut rx, filter) = state?;
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let delivery = filter(&change);
                    if delivery == Delivery::Skip {
                        continue;
                    }
                    let event = to_sse(&change);
                    let next = (delivery == Delivery::Send).then_some((rx, filter));
                    return Some((Ok(event), next));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change stream subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

fn to_sse(change: &ChangeEvent) -> Event {
    let event = Event::default().event(change.name());
    match event.json_data(change) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Failed to encode change event");
            Event::default().event(change.name())
        }
    }
}
