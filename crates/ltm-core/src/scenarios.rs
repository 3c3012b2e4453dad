//! End-to-end flows across membership, messaging and the payment workflows.

use ltm_shared::payment::PaymentEvent;
use ltm_shared::{ChatStatus, GroupRole, MessageKind};
use ltm_store::StoreError;

use crate::messaging::NewMessage;
use crate::testing::{service, service_with_lawyer, signup, LAWYER};
use crate::webhooks::WorkflowOutcome;
use crate::ChatError;

fn event(body: &str) -> PaymentEvent {
    PaymentEvent::parse(body.as_bytes()).unwrap()
}

#[test]
fn deleting_a_group_leaves_no_orphans() {
    let svc = service();
    signup(&svc, "u1");
    signup(&svc, "b");
    let group = svc
        .create_group("u1", "Book Club", &["b@example.com".to_string()])
        .unwrap()
        .group;
    svc.post_message("b", group.id, NewMessage::text("hello")).unwrap();
    svc.add_members_by_email("u1", group.id, &["nobody@example.com".to_string()])
        .unwrap();

    svc.delete_group("u1", group.id).unwrap();

    let db = svc.database();
    assert!(matches!(db.get_group(group.id), Err(StoreError::NotFound)));
    assert!(db.list_members(group.id).unwrap().is_empty());
    assert!(db.list_messages_for_group(group.id).unwrap().is_empty());
    assert!(db.list_memberships_for_user("b").unwrap().is_empty());
}

#[test]
fn reading_messages_requires_membership() {
    let svc = service();
    for user in ["u1", "b", "c"] {
        signup(&svc, user);
    }
    let group = svc
        .create_group("u1", "Book Club", &["b@example.com".to_string()])
        .unwrap()
        .group;
    svc.post_message("u1", group.id, NewMessage::text("welcome")).unwrap();

    assert_eq!(svc.list_messages("b", group.id).unwrap().len(), 1);
    assert!(matches!(svc.list_messages("c", group.id), Err(ChatError::Forbidden(_))));

    svc.leave_group("b", group.id).unwrap();
    assert!(matches!(svc.list_messages("b", group.id), Err(ChatError::Forbidden(_))));

    svc.add_members_by_email("u1", group.id, &["c@example.com".to_string()])
        .unwrap();
    assert_eq!(svc.list_messages("c", group.id).unwrap().len(), 3);
}

#[test]
fn new_group_round_trips_through_slug_with_admin_only() {
    let svc = service();
    signup(&svc, "u1");
    let created = svc.create_group("u1", "Book Club", &[]).unwrap().group;

    let by_slug = svc.get_group_by_slug("u1", &created.url_slug).unwrap();
    assert_eq!(by_slug, created);

    let members = svc.list_members("u1", created.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, "u1");
    assert_eq!(members[0].role, GroupRole::Admin);
}

#[test]
fn book_club_creation_and_invite() {
    let svc = service();
    signup(&svc, "u1");
    signup(&svc, "b");

    let created = svc
        .create_group("u1", "Book Club", &["b@example.com".to_string()])
        .unwrap();
    let group = created.group;
    assert_eq!(group.chat_status, ChatStatus::Default);

    let members = svc.list_members("u1", group.id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!((members[0].user_id.as_str(), members[0].role), ("u1", GroupRole::Admin));
    assert_eq!((members[1].user_id.as_str(), members[1].role), ("b", GroupRole::Member));

    // Creation-time invites are silent.
    assert!(svc.list_messages("u1", group.id).unwrap().is_empty());
}

#[test]
fn activation_then_cancellation_lifecycle() {
    let svc = service_with_lawyer();
    signup(&svc, "u1");
    let group = svc.create_group("u1", "Book Club", &[]).unwrap().group;
    svc.set_recent_group("u1", &format!("https://app.example.com/groups/{}", group.id))
        .unwrap();

    let checkout = event(
        r#"{"id":"evt_checkout","type":"checkout.session.completed",
            "data":{"object":{"client_reference_id":"u1","customer":"cus_42"}}}"#,
    );
    svc.handle_privilege_event(&checkout).unwrap();

    let db = svc.database();
    assert_eq!(db.get_group(group.id).unwrap().chat_status, ChatStatus::Activated);
    let messages = db.list_messages_for_group(group.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageKind::System);
    assert_eq!(messages[1].author_user_id.as_deref(), Some(LAWYER));
    assert!(db.find_member(group.id, LAWYER).unwrap().is_some());

    // The cancellation only names the billing customer.
    let cancel = event(
        r#"{"id":"evt_cancel","type":"customer.subscription.deleted",
            "data":{"object":{"customer":"cus_42"}}}"#,
    );
    svc.handle_privilege_event(&cancel).unwrap();

    assert_eq!(db.get_group(group.id).unwrap().chat_status, ChatStatus::Default);
    let messages = db.list_messages_for_group(group.id).unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].kind, MessageKind::System);
    assert!(db.find_member(group.id, LAWYER).unwrap().is_none());

    assert_eq!(svc.handle_privilege_event(&cancel).unwrap(), WorkflowOutcome::Duplicate);
    assert_eq!(db.list_messages_for_group(group.id).unwrap().len(), 3);
    assert_eq!(db.list_members(group.id).unwrap().len(), 1);
}

#[test]
fn activating_twice_posts_one_notice() {
    let svc = service_with_lawyer();
    signup(&svc, "u1");
    let group = svc.create_group("u1", "Book Club", &[]).unwrap().group;
    svc.set_recent_group("u1", &group.id.to_string()).unwrap();

    for id in ["evt_a", "evt_b"] {
        let body = format!(
            r#"{{"id":"{id}","type":"checkout.session.completed",
                "data":{{"object":{{"client_reference_id":"u1"}}}}}}"#
        );
        svc.handle_privilege_event(&event(&body)).unwrap();
    }

    let notices = svc
        .database()
        .list_messages_for_group(group.id)
        .unwrap()
        .into_iter()
        .filter(|m| m.kind == MessageKind::System)
        .count();
    assert_eq!(notices, 1);
    assert_eq!(
        svc.database().get_group(group.id).unwrap().chat_status,
        ChatStatus::Activated
    );
}

#[test]
fn deactivation_skips_groups_where_payer_is_only_a_member() {
    let svc = service_with_lawyer();
    signup(&svc, "u1");
    signup(&svc, "u2");

    // u2 administers an activated group that u1 belongs to.
    let foreign = svc
        .create_group("u2", "Theirs", &["u1@example.com".to_string()])
        .unwrap()
        .group;
    svc.set_recent_group("u2", &foreign.id.to_string()).unwrap();
    svc.handle_privilege_event(&event(
        r#"{"id":"evt_1","type":"checkout.session.completed",
            "data":{"object":{"client_reference_id":"u2","customer":"cus_2"}}}"#,
    ))
    .unwrap();

    let own = svc.create_group("u1", "Mine", &[]).unwrap().group;
    svc.set_recent_group("u1", &own.id.to_string()).unwrap();
    svc.handle_privilege_event(&event(
        r#"{"id":"evt_2","type":"checkout.session.completed",
            "data":{"object":{"client_reference_id":"u1","customer":"cus_1"}}}"#,
    ))
    .unwrap();

    let outcome = svc
        .handle_privilege_event(&event(
            r#"{"id":"evt_3","type":"customer.subscription.deleted",
                "data":{"object":{"customer":"cus_1"}}}"#,
        ))
        .unwrap();
    assert_eq!(outcome, WorkflowOutcome::Applied { groups: vec![own.id] });

    let db = svc.database();
    assert_eq!(db.get_group(own.id).unwrap().chat_status, ChatStatus::Default);
    assert_eq!(db.get_group(foreign.id).unwrap().chat_status, ChatStatus::Activated);
    assert!(db.find_member(foreign.id, LAWYER).unwrap().is_some());
}
