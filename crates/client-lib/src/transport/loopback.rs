//! In-process transport.
//!
//! `LoopbackBroker` hands out `LoopbackTransport`s that talk to each other
//! without a socket: publishing to a destination delivers to every connected
//! loopback transport subscribed to it. The broker also records what was
//! created and published, which makes it the transport of choice for tests
//! and for running dashboards offline.
//!
//! Frames retained with [`LoopbackBroker::retain`] are handed to a new
//! subscription from inside `subscribe`, on the caller's thread.

use super::{
    CloseCallback, CloseReason, FrameCallback, HandshakeCallback, SubscriptionHandle, Transport,
    TransportFactory,
};
use crate::envelope::RawFrame;
use crate::metrics;
use parking_lot::Mutex;
use realtime_common::Topic;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct BrokerState {
    transports: Vec<Arc<LoopbackTransport>>,
    published: Vec<(String, String)>,
    /// Last retained frame per topic
    retained: HashMap<String, RawFrame>,
    manual_handshake: bool,
}

/// Factory and switchboard for loopback transports
#[derive(Clone, Default)]
pub struct LoopbackBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl LoopbackBroker {
    /// Transports complete their handshake as soon as `connect` is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Transports wait for [`LoopbackTransport::complete_handshake`]
    pub fn with_manual_handshake() -> Self {
        let broker = Self::default();
        broker.state.lock().manual_handshake = true;
        broker
    }

    /// Number of transports this broker has constructed
    pub fn transports_created(&self) -> usize {
        self.state.lock().transports.len()
    }

    pub fn transport(&self, index: usize) -> Option<Arc<LoopbackTransport>> {
        self.state.lock().transports.get(index).cloned()
    }

    /// Most recently created transport
    pub fn latest(&self) -> Option<Arc<LoopbackTransport>> {
        self.state.lock().transports.last().cloned()
    }

    /// Every `(destination, body)` published through a connected transport
    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().published.clone()
    }

    /// Keep `frame` for `topic`; later subscriptions on a connected
    /// transport receive it immediately.
    pub fn retain(&self, topic: &str, frame: impl Into<RawFrame>) {
        self.state.lock().retained.insert(topic.to_string(), frame.into());
    }

    /// Deliver `frame` to every subscription on `topic` across all connected
    /// transports. Returns the number of callbacks invoked.
    pub fn deliver(&self, topic: &str, frame: impl Into<RawFrame>) -> usize {
        let frame = frame.into();
        let transports = self.state.lock().transports.clone();
        transports
            .iter()
            .map(|transport| transport.deliver(topic, frame.clone()))
            .sum()
    }
}

impl TransportFactory for LoopbackBroker {
    fn create(&self) -> Arc<dyn Transport> {
        let mut state = self.state.lock();
        let transport = Arc::new(LoopbackTransport {
            index: state.transports.len(),
            manual_handshake: state.manual_handshake,
            broker: Arc::downgrade(&self.state),
            session: Mutex::new(Session::default()),
        });
        state.transports.push(transport.clone());
        ::metrics::counter!(metrics::TRANSPORT_CREATED).increment(1);
        transport
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Handshaking,
    Connected,
    Closed,
}

#[derive(Default)]
struct Session {
    phase: Phase,
    on_handshake: Option<HandshakeCallback>,
    on_closed: Option<CloseCallback>,
    subscriptions: BTreeMap<u64, (Topic, FrameCallback)>,
    next_id: u64,
    connect_calls: usize,
    disconnect_calls: usize,
}

/// A single-use loopback session created by [`LoopbackBroker`]
pub struct LoopbackTransport {
    index: usize,
    manual_handshake: bool,
    broker: Weak<Mutex<BrokerState>>,
    session: Mutex<Session>,
}

impl LoopbackTransport {
    /// Position in the broker's creation order
    pub fn index(&self) -> usize {
        self.index
    }

    /// Finish a pending handshake. Returns false if none was pending.
    pub fn complete_handshake(&self) -> bool {
        let callback = {
            let mut session = self.session.lock();
            if session.phase != Phase::Handshaking {
                return false;
            }
            session.phase = Phase::Connected;
            session.on_handshake.take()
        };
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Abort a pending handshake as if no endpoint answered
    pub fn fail_handshake(&self, reason: &str) -> bool {
        let callback = {
            let mut session = self.session.lock();
            if session.phase != Phase::Handshaking {
                return false;
            }
            Self::close_locked(&mut session)
        };
        if let Some(callback) = callback {
            callback(CloseReason::HandshakeFailed(reason.to_string()));
        }
        true
    }

    /// Drop an established session as if the socket went away
    pub fn sever(&self, reason: &str) -> bool {
        let callback = {
            let mut session = self.session.lock();
            if session.phase != Phase::Connected {
                return false;
            }
            Self::close_locked(&mut session)
        };
        if let Some(callback) = callback {
            callback(CloseReason::Lost(reason.to_string()));
        }
        true
    }

    fn close_locked(session: &mut Session) -> Option<CloseCallback> {
        session.phase = Phase::Closed;
        session.on_handshake = None;
        session.subscriptions.clear();
        session.on_closed.take()
    }

    /// Topics with a live subscription, one entry per subscription
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.session
            .lock()
            .subscriptions
            .values()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.session.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.session.lock().disconnect_calls
    }

    fn retained(&self, topic: &Topic) -> Option<RawFrame> {
        let broker = self.broker.upgrade()?;
        let frame = broker.lock().retained.get(topic.as_str()).cloned();
        frame
    }

    /// Deliver `frame` to this transport's subscriptions on `topic`
    pub fn deliver(&self, topic: &str, frame: impl Into<RawFrame>) -> usize {
        let callbacks: Vec<FrameCallback> = {
            let session = self.session.lock();
            if session.phase != Phase::Connected {
                return 0;
            }
            session
                .subscriptions
                .values()
                .filter(|(subscribed, _)| subscribed.as_str() == topic)
                .map(|(_, callback)| callback.clone())
                .collect()
        };

        let frame = frame.into();
        for callback in &callbacks {
            callback(frame.clone());
        }
        callbacks.len()
    }
}

impl Transport for LoopbackTransport {
    fn connect(&self, on_handshake: HandshakeCallback, on_closed: CloseCallback) {
        {
            let mut session = self.session.lock();
            session.connect_calls += 1;
            if session.phase != Phase::Idle {
                tracing::warn!("Loopback transport {} is single-use; ignoring connect", self.index);
                return;
            }
            session.phase = Phase::Handshaking;
            session.on_handshake = Some(on_handshake);
            session.on_closed = Some(on_closed);
        }

        if !self.manual_handshake {
            self.complete_handshake();
        }
    }

    fn subscribe(&self, topic: &Topic, on_frame: FrameCallback) -> SubscriptionHandle {
        let (id, connected) = {
            let mut session = self.session.lock();
            let id = session.next_id;
            session.next_id += 1;
            session.subscriptions.insert(id, (topic.clone(), on_frame.clone()));
            (id, session.phase == Phase::Connected)
        };

        if connected {
            if let Some(frame) = self.retained(topic) {
                on_frame(frame);
            }
        }
        SubscriptionHandle::new(id, topic.clone())
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.session.lock().subscriptions.remove(&handle.id());
    }

    fn publish(&self, destination: &str, body: &str) {
        if !self.is_connected() {
            tracing::debug!("Loopback transport {} not connected; dropping publish", self.index);
            return;
        }

        let Some(broker) = self.broker.upgrade() else {
            return;
        };
        broker
            .lock()
            .published
            .push((destination.to_string(), body.to_string()));

        LoopbackBroker { state: broker }.deliver(destination, RawFrame::Text(body.to_string()));
    }

    fn disconnect(&self) {
        let mut session = self.session.lock();
        session.disconnect_calls += 1;
        session.phase = Phase::Closed;
        session.on_handshake = None;
        session.on_closed = None;
        session.subscriptions.clear();
    }

    fn is_connected(&self) -> bool {
        self.session.lock().phase == Phase::Connected
    }
}
