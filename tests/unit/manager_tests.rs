// =========================
// tests/unit/manager_tests.rs
// =========================
//! Connection manager lifecycle over the loopback transport
use parking_lot::Mutex;
use realtime_client::config::ReconnectSettings;
use realtime_client::transport::LoopbackBroker;
use realtime_client::{ConnectOutcome, ConnectionManager, ConnectionState, Envelope, Identity, Role};
use std::sync::Arc;
use std::thread;

fn manager(broker: &LoopbackBroker) -> Arc<ConnectionManager> {
    let reconnect = ReconnectSettings {
        enabled: false,
        ..ReconnectSettings::default()
    };
    Arc::new(ConnectionManager::new(Arc::new(broker.clone()), reconnect))
}

#[test]
fn test_concurrent_connects_open_one_transport() {
    let broker = LoopbackBroker::with_manual_handshake();
    let manager = manager(&broker);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || manager.connect(Identity::new("42", Role::Lecturer), || {}, |_| {}))
        })
        .collect();
    let outcomes: Vec<ConnectOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(broker.transports_created(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| **o == ConnectOutcome::Started).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == ConnectOutcome::AlreadyActive).count(),
        7
    );
}

#[test]
fn test_identity_switch_disconnects_old_transport_first() {
    let broker = LoopbackBroker::new();
    let manager = manager(&broker);
    let from_a = Arc::new(Mutex::new(Vec::<Envelope>::new()));

    let sink = from_a.clone();
    manager.connect(
        Identity::new("a", Role::Lecturer),
        || {},
        move |envelope| sink.lock().push(envelope),
    );
    let first = broker.latest().unwrap();

    manager.connect(Identity::new("b", Role::Lecturer), || {}, |_| {});
    assert_eq!(first.disconnect_calls(), 1);
    assert_eq!(broker.transports_created(), 2);

    // Anything still addressed to a's topics is dropped
    first.deliver("role/LECTURER/a", r#"{"type":"APPROVE_COURSE"}"#);
    broker.deliver("role/LECTURER", r#"{"type":"APPROVE_COURSE"}"#);
    assert!(from_a.lock().is_empty());
}

#[test]
fn test_lecturer_42_topics() {
    let broker = LoopbackBroker::new();
    let manager = manager(&broker);
    manager.connect(Identity::new("42", Role::Lecturer), || {}, |_| {});

    let topics: Vec<String> = manager
        .subscribed_topics()
        .into_iter()
        .map(|t| t.to_string())
        .collect();
    assert_eq!(topics, ["broadcast", "role/LECTURER", "role/LECTURER/42"]);
}

#[test]
fn test_double_disconnect() {
    let broker = LoopbackBroker::new();
    let manager = manager(&broker);
    manager.connect(Identity::new("1", Role::SubAdmin), || {}, |_| {});

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_send_without_connection_never_publishes() {
    let broker = LoopbackBroker::new();
    let manager = manager(&broker);

    manager.send("/app/requests", "{}");
    manager.connect(Identity::new("1", Role::User), || {}, |_| {});
    manager.disconnect();
    manager.send("/app/requests", "{}");

    assert!(broker.published().is_empty());
}

#[test]
fn test_send_passes_destination_through() {
    let broker = LoopbackBroker::new();
    let manager = manager(&broker);
    manager.connect(Identity::new("1", Role::User), || {}, |_| {});

    manager.send("any/destination?format=raw", "body");
    assert_eq!(
        broker.published(),
        vec![("any/destination?format=raw".to_string(), "body".to_string())]
    );
}
