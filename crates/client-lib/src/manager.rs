// ============================
// realtime-client/src/manager.rs
// ============================
//! Connection Manager.
//!
//! Owns at most one live connection per process, and that connection always
//! belongs to the identity most recently passed to [`ConnectionManager::connect`].
//!
//! ```text
//! DISCONNECTED --connect--> CONNECTING --handshake--> CONNECTED
//!       ^                      |   ^                      |
//!       |                      |   +----transport lost----+   (reconnect enabled)
//!       +--disconnect / identity change / attempts exhausted--+
//! ```
//!
//! Every connection attempt gets a fresh generation number. Transport
//! callbacks carry the generation they were created for and are ignored once
//! it is no longer current, so nothing from a torn-down transport reaches a
//! listener after `disconnect()` returns.
//!
//! Lock order is listener gate, then the connection slot. The slot is never
//! held while a transport is asked to subscribe or a listener runs.

use crate::config::{ReconnectSettings, Settings};
use crate::envelope::{self, Envelope, RawFrame};
use crate::metrics;
use crate::transport::{
    CloseReason, FrameCallback, SubscriptionHandle, Transport, TransportFactory,
    WsTransportFactory,
};
use parking_lot::{Mutex, ReentrantMutex};
use rand::Rng;
use realtime_common::{Identity, Topic, TopicSet};
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// What a call to [`ConnectionManager::connect`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection attempt was started
    Started,
    /// The same identity is already connecting or connected; nothing changed
    AlreadyActive,
    /// A connection for a different identity was torn down first
    Replaced { previous: Identity },
}

struct Listeners {
    on_connected: Box<dyn Fn() + Send + Sync>,
    on_message: Box<dyn Fn(Envelope) + Send + Sync>,
    /// Held for the duration of every listener call. Reentrant so a listener
    /// may call back into the manager on the same thread.
    gate: ReentrantMutex<Cell<bool>>,
}

impl Listeners {
    fn new(on_connected: Box<dyn Fn() + Send + Sync>, on_message: Box<dyn Fn(Envelope) + Send + Sync>) -> Self {
        Self {
            on_connected,
            on_message,
            gate: ReentrantMutex::new(Cell::new(true)),
        }
    }

    /// Waits for any listener call in flight, then refuses new ones.
    /// Must not be called with the connection slot locked.
    fn retire(&self) {
        self.gate.lock().set(false);
    }
}

struct Connection {
    identity: Identity,
    generation: u64,
    state: ConnectionState,
    /// `None` while waiting out a reconnect delay
    transport: Option<Arc<dyn Transport>>,
    subscriptions: HashMap<Topic, SubscriptionHandle>,
    listeners: Arc<Listeners>,
    attempts: u32,
    retry: Option<JoinHandle<()>>,
}

impl Connection {
    fn teardown(mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if let Some(transport) = self.transport.take() {
            for handle in self.subscriptions.values() {
                transport.unsubscribe(handle);
            }
            transport.disconnect();
        }
        self.subscriptions.clear();
        tracing::info!("Connection for {} torn down", self.identity.id);
    }
}

struct Shared {
    factory: Arc<dyn TransportFactory>,
    reconnect: ReconnectSettings,
    current: Mutex<Option<Connection>>,
    generations: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn is_live(&self, generation: u64) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|conn| conn.generation == generation && conn.state.is_connected())
    }

    fn start_transport(shared: &Arc<Shared>, transport: Arc<dyn Transport>, generation: u64) {
        let weak = Arc::downgrade(shared);
        let on_handshake = {
            let weak = weak.clone();
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    Shared::handshake_complete(&shared, generation);
                }
            })
        };
        let on_closed = Box::new(move |reason: CloseReason| {
            if let Some(shared) = weak.upgrade() {
                Shared::transport_closed(&shared, generation, reason);
            }
        });
        transport.connect(on_handshake, on_closed);
    }

    fn handshake_complete(shared: &Arc<Shared>, generation: u64) {
        let (transport, pending, listeners) = {
            let mut current = shared.current.lock();
            let Some(conn) = current
                .as_mut()
                .filter(|conn| conn.generation == generation && conn.state == ConnectionState::Connecting)
            else {
                tracing::debug!("Ignoring handshake from superseded transport (generation {})", generation);
                return;
            };
            let Some(transport) = conn.transport.clone() else {
                return;
            };

            conn.state = ConnectionState::Connected;
            conn.attempts = 0;
            shared.set_state(ConnectionState::Connected);
            let pending: Vec<Topic> = TopicSet::for_identity(&conn.identity)
                .into_iter()
                .filter(|topic| !conn.subscriptions.contains_key(topic))
                .collect();
            (transport, pending, conn.listeners.clone())
        };

        // A transport may deliver retained frames from inside `subscribe`.
        let handles: Vec<SubscriptionHandle> = pending
            .iter()
            .map(|topic| {
                let callback = frame_callback(Arc::downgrade(shared), generation, listeners.clone());
                transport.subscribe(topic, callback)
            })
            .collect();

        let connected = {
            let mut current = shared.current.lock();
            match current.as_mut().filter(|conn| conn.generation == generation) {
                Some(conn) => {
                    conn.subscriptions.extend(pending.into_iter().zip(handles.iter().cloned()));
                    Some((conn.identity.clone(), conn.subscriptions.len()))
                },
                None => None,
            }
        };
        let Some((identity, topics)) = connected else {
            tracing::debug!("Connection superseded while subscribing (generation {})", generation);
            for handle in &handles {
                transport.unsubscribe(handle);
            }
            return;
        };

        tracing::info!("Connected as {} ({}), {} topics", identity.id, identity.role, topics);
        let gate = listeners.gate.lock();
        if !gate.get() || !shared.is_live(generation) {
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| (listeners.on_connected)())).is_err() {
            tracing::error!("on_connected listener panicked");
            ::metrics::counter!(metrics::HANDLER_FAILED).increment(1);
        }
    }

    fn transport_closed(shared: &Arc<Shared>, generation: u64, reason: CloseReason) {
        let mut current = shared.current.lock();
        let Some(conn) = current.as_mut().filter(|conn| conn.generation == generation) else {
            tracing::debug!("Ignoring close from superseded transport: {}", reason);
            return;
        };

        tracing::warn!("Transport for {} closed: {}", conn.identity.id, reason);
        conn.subscriptions.clear();
        if let Some(transport) = conn.transport.take() {
            transport.disconnect();
        }

        let runtime = tokio::runtime::Handle::try_current();
        if !shared.reconnect.allows_attempt(conn.attempts) || runtime.is_err() {
            tracing::warn!(
                "Giving up on {} after {} reconnect attempts",
                conn.identity.id,
                conn.attempts
            );
            *current = None;
            shared.set_state(ConnectionState::Disconnected);
            return;
        }

        let delay = with_jitter(shared.reconnect.delay_for_attempt(conn.attempts));
        let next = shared.next_generation();
        conn.attempts += 1;
        conn.generation = next;
        conn.state = ConnectionState::Connecting;
        shared.set_state(ConnectionState::Connecting);
        ::metrics::counter!(metrics::RECONNECT_SCHEDULED).increment(1);
        tracing::info!(
            "Reconnecting {} in {:?} (attempt {})",
            conn.identity.id,
            delay,
            conn.attempts
        );

        let weak = Arc::downgrade(shared);
        if let Ok(runtime) = runtime {
            conn.retry = Some(runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(shared) = weak.upgrade() {
                    Shared::retry(&shared, next);
                }
            }));
        }
    }

    fn retry(shared: &Arc<Shared>, generation: u64) {
        let transport = {
            let mut current = shared.current.lock();
            let Some(conn) = current.as_mut().filter(|conn| {
                conn.generation == generation
                    && conn.state == ConnectionState::Connecting
                    && conn.transport.is_none()
            }) else {
                return;
            };
            conn.retry = None;
            let transport = shared.factory.create();
            conn.transport = Some(transport.clone());
            transport
        };
        Shared::start_transport(shared, transport, generation);
    }
}

/// Spread reconnects of many clients by up to a tenth of the delay
fn with_jitter(delay: Duration) -> Duration {
    let spread = u64::try_from(delay.as_millis() / 10).unwrap_or(0);
    delay + Duration::from_millis(rand::rng().random_range(0..=spread))
}

fn frame_callback(shared: Weak<Shared>, generation: u64, listeners: Arc<Listeners>) -> FrameCallback {
    Arc::new(move |raw: RawFrame| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let gate = listeners.gate.lock();
        if !gate.get() || !shared.is_live(generation) {
            tracing::debug!("Dropping frame for stale connection (generation {})", generation);
            return;
        }

        let Some(envelope) = envelope::parse(&raw) else {
            tracing::warn!("Dropping malformed frame: {:?}", raw);
            ::metrics::counter!(metrics::FRAME_DROPPED).increment(1);
            return;
        };

        tracing::debug!("Inbound {}", envelope.kind);
        if catch_unwind(AssertUnwindSafe(|| (listeners.on_message)(envelope))).is_err() {
            tracing::error!("on_message listener panicked; connection kept");
            ::metrics::counter!(metrics::HANDLER_FAILED).increment(1);
        }
    })
}

/// Owns the process's single real-time connection
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn TransportFactory>, reconnect: ReconnectSettings) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                factory,
                reconnect,
                current: Mutex::new(None),
                generations: AtomicU64::new(0),
                state_tx,
            }),
        }
    }

    /// Manager speaking WebSocket to the configured endpoints
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(WsTransportFactory::new(settings.transport.clone())),
            settings.reconnect.clone(),
        )
    }

    /// Connect as `identity`.
    ///
    /// A call for the identity that is already connecting or connected is a
    /// no-op and its listeners are dropped. A call for a different identity
    /// tears the old connection down before the new transport is created.
    /// `on_connected` runs after every completed handshake, including after
    /// a reconnect.
    pub fn connect<C, M>(&self, identity: Identity, on_connected: C, on_message: M) -> ConnectOutcome
    where
        C: Fn() + Send + Sync + 'static,
        M: Fn(Envelope) + Send + Sync + 'static,
    {
        let (transport, generation, outcome, retired) = {
            let mut current = self.shared.current.lock();

            if let Some(conn) = current.as_ref() {
                if conn.identity.same_principal(&identity) && conn.state != ConnectionState::Disconnected {
                    tracing::info!("Already {:?} as {}; connect coalesced", conn.state, identity.id);
                    ::metrics::counter!(metrics::CONNECT_COALESCED).increment(1);
                    return ConnectOutcome::AlreadyActive;
                }
            }

            let (outcome, retired) = match current.take() {
                Some(previous) => {
                    tracing::info!("Identity changed from {} to {}", previous.identity.id, identity.id);
                    ::metrics::counter!(metrics::CONNECT_REPLACED).increment(1);
                    let previous_identity = previous.identity.clone();
                    let listeners = previous.listeners.clone();
                    previous.teardown();
                    let outcome = ConnectOutcome::Replaced {
                        previous: previous_identity,
                    };
                    (outcome, Some(listeners))
                },
                None => (ConnectOutcome::Started, None),
            };

            let generation = self.shared.next_generation();
            let transport = self.shared.factory.create();
            *current = Some(Connection {
                identity,
                generation,
                state: ConnectionState::Connecting,
                transport: Some(transport.clone()),
                subscriptions: HashMap::new(),
                listeners: Arc::new(Listeners::new(Box::new(on_connected), Box::new(on_message))),
                attempts: 0,
                retry: None,
            });
            self.shared.set_state(ConnectionState::Connecting);
            (transport, generation, outcome, retired)
        };

        if let Some(listeners) = retired {
            listeners.retire();
        }
        Shared::start_transport(&self.shared, transport, generation);
        outcome
    }

    /// Tear down the connection, if any. Idempotent and never panics.
    ///
    /// Once this returns no listener of the torn-down connection is running
    /// or will run, unless it was called from inside that listener.
    pub fn disconnect(&self) {
        let previous = {
            let mut current = self.shared.current.lock();
            let previous = current.take();
            if previous.is_some() {
                self.shared.set_state(ConnectionState::Disconnected);
            }
            previous
        };
        let Some(conn) = previous else {
            tracing::debug!("disconnect: already disconnected");
            return;
        };

        let listeners = conn.listeners.clone();
        if catch_unwind(AssertUnwindSafe(|| conn.teardown())).is_err() {
            tracing::error!("Transport panicked during teardown");
        }
        listeners.retire();
    }

    /// Publish to `destination` if connected; otherwise the body is dropped.
    /// Callers that need delivery must check [`is_connected`](Self::is_connected)
    /// and queue on their side.
    pub fn send(&self, destination: &str, body: &str) {
        let transport = {
            let current = self.shared.current.lock();
            current
                .as_ref()
                .filter(|conn| conn.state.is_connected())
                .and_then(|conn| conn.transport.clone())
        };

        match transport {
            Some(transport) => transport.publish(destination, body),
            None => tracing::debug!("Not connected; dropping send to {}", destination),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared
            .current
            .lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |conn| conn.state)
    }

    /// Identity of the live connection
    pub fn current_identity(&self) -> Option<Identity> {
        self.shared
            .current
            .lock()
            .as_ref()
            .map(|conn| conn.identity.clone())
    }

    /// Topics currently subscribed, sorted
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .shared
            .current
            .lock()
            .as_ref()
            .map(|conn| conn.subscriptions.keys().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Consecutive reconnect attempts since the last completed handshake
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared
            .current
            .lock()
            .as_ref()
            .map_or(0, |conn| conn.attempts)
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
