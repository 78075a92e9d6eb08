//! Transport Client contract.
//!
//! A transport wraps one message-oriented socket session. It reports
//! readiness through the handshake callback and nothing else: a transport
//! that never becomes ready simply never calls it. Transports do not retry;
//! the [`ConnectionManager`](crate::manager::ConnectionManager) owns that policy.

pub mod loopback;
pub mod ws;

use crate::envelope::RawFrame;
use realtime_common::Topic;
use std::fmt;
use std::sync::Arc;

pub use loopback::{LoopbackBroker, LoopbackTransport};
pub use ws::{WsTransport, WsTransportFactory};

/// Invoked exactly once, after the transport reports itself ready
pub type HandshakeCallback = Box<dyn FnOnce() + Send + 'static>;
/// Invoked at most once, when the session ends without `disconnect()`
pub type CloseCallback = Box<dyn FnOnce(CloseReason) + Send + 'static>;
/// Invoked once per inbound frame on a subscribed topic, in delivery order
pub type FrameCallback = Arc<dyn Fn(RawFrame) + Send + Sync + 'static>;

/// Why a transport session ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// No endpoint completed the handshake
    HandshakeFailed(String),
    /// An established session dropped
    Lost(String),
    /// `connect` was called outside a tokio runtime
    NoRuntime,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::HandshakeFailed(reason) => write!(f, "handshake failed: {reason}"),
            CloseReason::Lost(reason) => write!(f, "connection lost: {reason}"),
            CloseReason::NoRuntime => f.write_str("no tokio runtime"),
        }
    }
}

/// Cancellation handle returned by [`Transport::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    topic: Topic,
}

impl SubscriptionHandle {
    pub fn new(id: u64, topic: Topic) -> Self {
        Self { id, topic }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Subscription id as sent on the wire
    pub fn wire_id(&self) -> String {
        format!("sub-{}", self.id)
    }
}

/// One pub/sub session over a socket
pub trait Transport: Send + Sync {
    /// Open the socket and perform the handshake. `on_handshake` fires once
    /// the session is ready; on failure it is never called and `on_closed`
    /// fires instead.
    fn connect(&self, on_handshake: HandshakeCallback, on_closed: CloseCallback);

    /// Register `on_frame` for frames addressed to `topic`. Subscribing twice
    /// to the same topic yields two independent subscriptions.
    fn subscribe(&self, topic: &Topic, on_frame: FrameCallback) -> SubscriptionHandle;

    /// Cancel a subscription. Once this returns no further frames reach its callback.
    fn unsubscribe(&self, handle: &SubscriptionHandle);

    /// Fire-and-forget send. Silently dropped while not connected.
    fn publish(&self, destination: &str, body: &str);

    /// Close the session. Idempotent; `on_closed` does not fire afterwards.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

/// Creates a fresh transport for every connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Transport>;
}
