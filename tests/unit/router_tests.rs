// =========================
// tests/unit/router_tests.rs
// =========================
//! Role routers against counting collaborators
use crate::test_utils::CountingServices;
use realtime_client::envelope::parse;
use realtime_client::{Entity, RawFrame, Role, RoleRouter};
use std::sync::Arc;

#[tokio::test]
async fn test_user_router_approve_lecturer() {
    let services = Arc::new(CountingServices::default());
    RoleRouter::for_role(Role::User)
        .dispatch_raw(&RawFrame::from(r#"{"type":"APPROVE_LECTURER"}"#), services.clone())
        .finished()
        .await;

    assert_eq!(services.profile_fetches(), 1);
    assert_eq!(services.reloads(), 1);
}

#[tokio::test]
async fn test_user_router_reject_lecturer() {
    let services = Arc::new(CountingServices::default());
    RoleRouter::for_role(Role::User)
        .dispatch_raw(&RawFrame::from(r#"{"type":"REJECT_LECTURER"}"#), services.clone())
        .finished()
        .await;

    assert_eq!(services.profile_fetches(), 1);
    assert_eq!(services.pending_fetches(), 1);
    assert_eq!(services.reloads(), 0);
}

#[tokio::test]
async fn test_unknown_type_touches_nothing_for_any_role() {
    let envelope = parse(&RawFrame::from(r#"{"type":"UNKNOWN_X","payload":{}}"#)).unwrap();
    let services = Arc::new(CountingServices::default());

    for role in Role::ALL {
        let outcome = RoleRouter::for_role(role).dispatch(&envelope, services.clone());
        assert!(outcome.is_ignored(), "{role} router acted on UNKNOWN_X");
    }
    assert_eq!(services.total_calls(), 0);
}

#[tokio::test]
async fn test_sub_admin_shares_admin_table() {
    let services = Arc::new(CountingServices::default());
    RoleRouter::for_role(Role::SubAdmin)
        .dispatch_raw(&RawFrame::from(r#"{"type":"NEW_PARTNER_REQUEST"}"#), services.clone())
        .finished()
        .await;

    assert_eq!(services.profile_fetches(), 0);
    assert_eq!(services.reloads(), 0);
    assert_eq!(services.stored_pending(), vec![Entity::Partner]);
}

#[tokio::test]
async fn test_course_approval_for_school() {
    let services = Arc::new(CountingServices::default());
    RoleRouter::for_role(Role::School)
        .dispatch_raw(&RawFrame::from(r#"{"type":"APPROVE_COURSE","payload":{"courseId":3}}"#), services.clone())
        .finished()
        .await;

    assert_eq!(services.stored_pending(), vec![Entity::Course]);
    assert_eq!(services.reloads(), 1);
}
