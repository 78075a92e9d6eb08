// ============================
// tests/integration/ws_flow_tests.rs
// ============================
//! WebSocket transport end to end against the dev broker.

use crate::test_utils::{eventually, settings_for, spawn_broker};
use parking_lot::Mutex;
use realtime_client::{ConnectionManager, ConnectionState, Envelope, Identity, MessageKind, Role};
use realtime_dev_broker::BrokerState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_subscribe_and_receive_over_websocket() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let manager = ConnectionManager::from_settings(&settings_for(addr));
    let received = Arc::new(Mutex::new(Vec::<Envelope>::new()));
    let connected = Arc::new(AtomicUsize::new(0));

    let sink = received.clone();
    let counter = connected.clone();
    manager.connect(
        Identity::new("42", Role::Lecturer),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        move |envelope| sink.lock().push(envelope),
    );

    eventually("all three subscriptions", || {
        state.subscriber_count("broadcast") == 1
            && state.subscriber_count("role/LECTURER") == 1
            && state.subscriber_count("role/LECTURER/42") == 1
    })
    .await;
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(connected.load(Ordering::SeqCst), 1);

    state
        .publish("role/LECTURER/42", r#"{"type":"APPROVE_COURSE","payload":{"courseId":9}}"#)
        .await;
    state.publish("role/LECTURER/42", "garbage").await;
    state.publish("role/LECTURER", r#"{"type":"REJECT_LECTURER"}"#).await;

    eventually("two envelopes", || received.lock().len() == 2).await;
    let received = received.lock();
    assert_eq!(received[0].kind, MessageKind::ApproveCourse);
    assert_eq!(received[0].payload["courseId"], 9);
    assert_eq!(received[1].kind, MessageKind::RejectLecturer);
}

#[tokio::test]
async fn test_send_reaches_other_subscribers() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let listener = ConnectionManager::from_settings(&settings_for(addr));
    let sender = ConnectionManager::from_settings(&settings_for(addr));
    let received = Arc::new(Mutex::new(Vec::<Envelope>::new()));

    let sink = received.clone();
    listener.connect(Identity::new("7", Role::User), || {}, move |e| sink.lock().push(e));
    sender.connect(Identity::new("admin", Role::Admin), || {}, |_| {});
    eventually("both connected", || {
        listener.is_connected() && sender.is_connected() && state.subscriber_count("role/USER/7") == 1
    })
    .await;

    sender.send("role/USER/7", r#"{"type":"APPROVE_PARTNER"}"#);
    eventually("delivery", || received.lock().len() == 1).await;
    assert_eq!(received.lock()[0].kind, MessageKind::ApprovePartner);
}

#[tokio::test]
async fn test_falls_back_to_second_endpoint() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let mut settings = settings_for(addr);
    settings.transport.endpoints.insert(0, "ws://127.0.0.1:9/ws".to_string());

    let manager = ConnectionManager::from_settings(&settings);
    manager.connect(Identity::new("1", Role::User), || {}, |_| {});
    eventually("connected through fallback", || manager.is_connected()).await;
    assert_eq!(state.clients_connected(), 1);
}

#[tokio::test]
async fn test_refused_handshake_ends_disconnected() {
    let state = BrokerState::with_token("s3cret");
    let (addr, _server) = spawn_broker(state.clone()).await;
    let mut settings = settings_for(addr);
    settings.transport.auth_token = Some("wrong".to_string());

    let manager = ConnectionManager::from_settings(&settings);
    let mut watch = manager.watch_state();
    manager.connect(Identity::new("1", Role::User), || {}, |_| {});

    watch
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();
    assert!(manager.current_identity().is_none());
    assert_eq!(state.clients_connected(), 0);
}

#[tokio::test]
async fn test_identity_switch_releases_broker_subscriptions() {
    let state = BrokerState::new();
    let (addr, _server) = spawn_broker(state.clone()).await;
    let manager = ConnectionManager::from_settings(&settings_for(addr));

    manager.connect(Identity::new("a", Role::School), || {}, |_| {});
    eventually("a subscribed", || state.subscriber_count("role/SCHOOL/a") == 1).await;

    manager.connect(Identity::new("b", Role::Organization), || {}, |_| {});
    eventually("a released and b subscribed", || {
        state.subscriber_count("role/SCHOOL/a") == 0 && state.subscriber_count("role/ORGANIZATION/b") == 1
    })
    .await;
    eventually("one socket", || state.clients_connected() == 1).await;
}
