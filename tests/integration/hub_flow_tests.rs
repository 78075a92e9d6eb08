// ============================
// tests/integration/hub_flow_tests.rs
// ============================
//! Mount points sharing one connection through the hub.

use crate::test_utils::{eventually, settings_for, spawn_broker, CountingServices};
use realtime_client::{ConnectOutcome, Identity, RealtimeHub, Role, RoleRouter};
use realtime_dev_broker::BrokerState;
use std::sync::Arc;

#[tokio::test]
async fn test_mounts_share_one_socket() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let hub = RealtimeHub::from_settings(&settings_for(addr));
    let identity = Identity::new("7", Role::User);

    let header = Arc::new(CountingServices::default());
    let sidebar = Arc::new(CountingServices::default());
    let first = hub
        .mount(identity.clone(), RoleRouter::for_role(identity.role), header.clone())
        .unwrap();
    let second = hub
        .clone()
        .mount(identity.clone(), RoleRouter::for_role(identity.role), sidebar.clone())
        .unwrap();

    assert_eq!(first.outcome(), &ConnectOutcome::Started);
    assert_eq!(second.outcome(), &ConnectOutcome::AlreadyActive);
    eventually("subscribed", || state.subscriber_count("role/USER/7") == 1).await;
    assert_eq!(state.clients_connected(), 1);

    state.publish("role/USER/7", r#"{"type":"APPROVE_LECTURER"}"#).await;
    eventually("both mounts routed", || header.reloads() == 1 && sidebar.reloads() == 1).await;
    assert_eq!(header.profile_fetches(), 1);
}

#[tokio::test]
async fn test_logout_tears_down_for_every_mount() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let hub = RealtimeHub::from_settings(&settings_for(addr));
    let services = Arc::new(CountingServices::default());

    let _mount = hub
        .mount(Identity::new("3", Role::Admin), RoleRouter::Admin, services.clone())
        .unwrap();
    eventually("connected", || hub.is_connected() && state.subscriber_count("role/ADMIN") == 1).await;

    hub.disconnect();
    assert!(!hub.instance().is_connected());
    eventually("socket closed", || state.clients_connected() == 0).await;

    assert_eq!(state.publish("role/ADMIN", r#"{"type":"NEW_COURSE_REQUEST"}"#).await, 0);
    assert_eq!(services.total_calls(), 0);
}
