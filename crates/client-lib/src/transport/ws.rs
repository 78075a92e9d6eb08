//! WebSocket transport using tokio-tungstenite.
//!
//! Each `WsTransport` owns one background task per session. The task walks
//! the configured endpoints in order until one completes the
//! `Connect`/`Connected` handshake, then pumps outbound frames from an
//! unbounded channel and routes inbound `Message` frames to subscription
//! callbacks by subscription id.

use super::{
    CloseCallback, CloseReason, FrameCallback, HandshakeCallback, SubscriptionHandle, Transport,
    TransportFactory,
};
use crate::config::TransportSettings;
use crate::envelope::RawFrame;
use crate::error::RealtimeError;
use crate::metrics;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use realtime_common::{ClientFrame, ServerFrame, Topic, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds a [`WsTransport`] per connection attempt
#[derive(Debug, Clone)]
pub struct WsTransportFactory {
    settings: TransportSettings,
}

impl WsTransportFactory {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self) -> Arc<dyn Transport> {
        ::metrics::counter!(metrics::TRANSPORT_CREATED).increment(1);
        Arc::new(WsTransport::new(self.settings.clone()))
    }
}

struct Shared {
    connected: AtomicBool,
    closed: AtomicBool,
    started: AtomicBool,
    next_id: AtomicU64,
    /// Keyed by wire id (`sub-N`)
    subscriptions: Mutex<HashMap<String, (Topic, FrameCallback)>>,
    /// Present only while a session is established
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn send(&self, frame: ClientFrame) -> bool {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn route(&self, text: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping unreadable broker frame: {}", e);
                ::metrics::counter!(metrics::FRAME_DROPPED).increment(1);
                return;
            },
        };

        match frame {
            ServerFrame::Message {
                subscription,
                destination,
                message_id,
                body,
            } => {
                let callback = self
                    .subscriptions
                    .lock()
                    .get(&subscription)
                    .map(|(_, callback)| callback.clone());
                match callback {
                    Some(callback) => {
                        tracing::debug!("Frame {} on {} ({})", message_id, destination, subscription);
                        callback(RawFrame::Text(body));
                    },
                    None => {
                        tracing::debug!("Frame {} for cancelled subscription {}", message_id, subscription);
                    },
                }
            },
            ServerFrame::Error { message } => {
                tracing::warn!("Broker reported error: {}", message);
            },
            ServerFrame::Connected { session, .. } => {
                tracing::debug!("Ignoring repeated Connected for session {}", session);
            },
        }
    }
}

/// Pub/sub session over a WebSocket
pub struct WsTransport {
    settings: TransportSettings,
    shared: Arc<Shared>,
}

impl WsTransport {
    pub fn new(settings: TransportSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            settings,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                started: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                subscriptions: Mutex::new(HashMap::new()),
                outbound: Mutex::new(None),
                shutdown,
            }),
        }
    }
}

impl Transport for WsTransport {
    fn connect(&self, on_handshake: HandshakeCallback, on_closed: CloseCallback) {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("WebSocket transport is single-use; ignoring connect");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("WebSocket transport needs a tokio runtime to connect");
            on_closed(CloseReason::NoRuntime);
            return;
        };

        runtime.spawn(run_session(
            self.settings.clone(),
            self.shared.clone(),
            on_handshake,
            on_closed,
        ));
    }

    fn subscribe(&self, topic: &Topic, on_frame: FrameCallback) -> SubscriptionHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = SubscriptionHandle::new(id, topic.clone());

        let mut subscriptions = self.shared.subscriptions.lock();
        subscriptions.insert(handle.wire_id(), (topic.clone(), on_frame));
        // Sent now if the session is up, otherwise replayed after the handshake.
        self.shared.send(ClientFrame::Subscribe {
            id: handle.wire_id(),
            destination: topic.to_string(),
        });
        handle
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let removed = self.shared.subscriptions.lock().remove(&handle.wire_id());
        if removed.is_some() {
            self.shared.send(ClientFrame::Unsubscribe {
                id: handle.wire_id(),
            });
        }
    }

    fn publish(&self, destination: &str, body: &str) {
        if !self.is_connected() {
            tracing::debug!("Not connected; dropping publish to {}", destination);
            return;
        }
        self.shared.send(ClientFrame::Send {
            destination: destination.to_string(),
            body: body.to_string(),
        });
    }

    fn disconnect(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.subscriptions.lock().clear();

        // Queue a graceful Disconnect, then drop the sender so the session
        // task closes the socket once the queue drains.
        if let Some(tx) = self.shared.outbound.lock().take() {
            let _ = tx.send(ClientFrame::Disconnect);
        }
        self.shared.shutdown.send_replace(true);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Resolves once `disconnect` flips the shutdown flag. The borrowed value
/// from `wait_for` is dropped here so the session future stays `Send`.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn run_session(
    settings: TransportSettings,
    shared: Arc<Shared>,
    on_handshake: HandshakeCallback,
    on_closed: CloseCallback,
) {
    let mut shutdown = shared.shutdown.subscribe();

    let opened = tokio::select! {
        opened = open_session(&settings) => opened,
        _ = stop_requested(&mut shutdown) => return,
    };

    let (ws, session) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!("No endpoint completed the handshake: {}", e);
            if !shared.closed.load(Ordering::SeqCst) {
                on_closed(CloseReason::HandshakeFailed(e.to_string()));
            }
            return;
        },
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();
    {
        let subscriptions = shared.subscriptions.lock();
        if shared.closed.load(Ordering::SeqCst) {
            return;
        }
        for (id, (topic, _)) in subscriptions.iter() {
            let _ = tx.send(ClientFrame::Subscribe {
                id: id.clone(),
                destination: topic.to_string(),
            });
        }
        *shared.outbound.lock() = Some(tx);
        shared.connected.store(true, Ordering::SeqCst);
    }

    tracing::info!("Pub/sub session {} established", session);
    on_handshake();

    let (mut write, mut read) = ws.split();
    let lost = loop {
        tokio::select! {
            biased;
            outbound = rx.recv() => match outbound {
                Some(frame) => {
                    let is_disconnect = matches!(frame, ClientFrame::Disconnect);
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Serialize failed: {}", e);
                            continue;
                        },
                    };
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        break Some(e.to_string());
                    }
                    if is_disconnect {
                        let _ = write.send(Message::Close(None)).await;
                        break None;
                    }
                },
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                },
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => shared.route(text.as_str()),
                Some(Ok(Message::Close(_))) => break Some("closed by broker".to_string()),
                // Pings are answered by tungstenite.
                Some(Ok(_)) => {},
                Some(Err(e)) => break Some(e.to_string()),
                None => break Some("stream ended".to_string()),
            },
            _ = stop_requested(&mut shutdown) => {
                let _ = write.send(Message::Close(None)).await;
                break None;
            },
        }
    };

    shared.connected.store(false, Ordering::SeqCst);
    shared.outbound.lock().take();
    tracing::info!("Pub/sub session {} ended", session);

    if let Some(reason) = lost {
        if !shared.closed.load(Ordering::SeqCst) {
            on_closed(CloseReason::Lost(reason));
        }
    }
}

/// Try every endpoint in order; the first completed handshake wins
async fn open_session(settings: &TransportSettings) -> Result<(WsStream, String), RealtimeError> {
    let timeout = settings.handshake_timeout();
    let mut last_error = RealtimeError::Handshake("no endpoints configured".to_string());

    for endpoint in &settings.endpoints {
        match tokio::time::timeout(timeout, handshake(endpoint, settings.auth_token.clone())).await {
            Ok(Ok(opened)) => return Ok(opened),
            Ok(Err(e)) => {
                tracing::warn!("Endpoint {} failed: {}", endpoint, e);
                last_error = e;
            },
            Err(_) => {
                tracing::warn!("Endpoint {} timed out", endpoint);
                last_error = RealtimeError::Handshake(format!(
                    "{} timed out after {}ms",
                    endpoint, settings.handshake_timeout_ms
                ));
            },
        }
    }

    Err(last_error)
}

async fn handshake(
    endpoint: &str,
    token: Option<String>,
) -> Result<(WsStream, String), RealtimeError> {
    let (mut ws, _response) = connect_async(endpoint).await?;

    let connect = ClientFrame::Connect {
        accept_version: PROTOCOL_VERSION.to_string(),
        token,
    };
    ws.send(Message::Text(serde_json::to_string(&connect)?.into()))
        .await?;

    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => match serde_json::from_str::<ServerFrame>(text.as_str())? {
                ServerFrame::Connected { version, session } => {
                    if version != PROTOCOL_VERSION {
                        tracing::warn!("Broker speaks protocol {}, expected {}", version, PROTOCOL_VERSION);
                    }
                    return Ok((ws, session));
                },
                ServerFrame::Error { message } => return Err(RealtimeError::Handshake(message)),
                ServerFrame::Message { .. } => {
                    tracing::debug!("Ignoring message frame before Connected");
                },
            },
            Message::Close(_) => {
                return Err(RealtimeError::Handshake("closed during handshake".to_string()));
            },
            _ => {},
        }
    }

    Err(RealtimeError::Handshake("stream ended during handshake".to_string()))
}
