// ============================
// realtime-dev-broker/src/lib.rs
// ============================
//! Minimal pub/sub broker speaking the client's wire frames over `/ws`.
//!
//! Meant for local development and end-to-end tests, not production: it
//! keeps everything in memory and fans each `Send` out to every subscriber
//! of exactly that destination.

pub mod metrics;
pub mod ws_router;

use dashmap::DashMap;
use realtime_common::ServerFrame;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use ws_router::create_router;

#[derive(Debug, Clone)]
struct Subscriber {
    client: Uuid,
    id: String,
}

#[derive(Default)]
struct BrokerInner {
    /// Outbound queue per connected socket
    clients: DashMap<Uuid, mpsc::Sender<ServerFrame>>,
    /// Destination -> subscribers
    subscriptions: DashMap<String, Vec<Subscriber>>,
    required_token: Option<String>,
}

/// Shared broker state
#[derive(Clone, Default)]
pub struct BrokerState {
    inner: Arc<BrokerInner>,
}

impl BrokerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `Connect` frames that do not carry `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                required_token: Some(token.into()),
                ..Default::default()
            }),
        }
    }

    pub(crate) fn accepts(&self, token: Option<&str>) -> bool {
        match &self.inner.required_token {
            Some(required) => token == Some(required.as_str()),
            None => true,
        }
    }

    pub(crate) fn register(&self, client: Uuid, outbound: mpsc::Sender<ServerFrame>) {
        self.inner.clients.insert(client, outbound);
    }

    pub(crate) fn subscribe(&self, client: Uuid, id: String, destination: String) {
        let mut subscribers = self.inner.subscriptions.entry(destination).or_default();
        subscribers.retain(|sub| !(sub.client == client && sub.id == id));
        subscribers.push(Subscriber { client, id });
    }

    pub(crate) fn unsubscribe(&self, client: Uuid, id: &str) {
        for mut subscribers in self.inner.subscriptions.iter_mut() {
            subscribers.retain(|sub| !(sub.client == client && sub.id == id));
        }
        self.inner.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
    }

    /// Forget a socket and all of its subscriptions
    pub(crate) fn remove_client(&self, client: Uuid) {
        self.inner.clients.remove(&client);
        for mut subscribers in self.inner.subscriptions.iter_mut() {
            subscribers.retain(|sub| sub.client != client);
        }
        self.inner.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
    }

    /// Deliver `body` to every subscriber of `destination`; returns how many
    /// subscriptions it was queued for
    pub async fn publish(&self, destination: &str, body: &str) -> usize {
        ::metrics::counter!(metrics::FRAMES_PUBLISHED).increment(1);

        // Collect first so no map guard is held across an await
        let targets: Vec<(mpsc::Sender<ServerFrame>, String)> = self
            .inner
            .subscriptions
            .get(destination)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter_map(|sub| {
                        self.inner
                            .clients
                            .get(&sub.client)
                            .map(|tx| (tx.clone(), sub.id.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut delivered = 0;
        for (tx, subscription) in targets {
            let frame = ServerFrame::Message {
                subscription,
                destination: destination.to_string(),
                message_id: Uuid::new_v4().to_string(),
                body: body.to_string(),
            };
            if tx.send(frame).await.is_ok() {
                delivered += 1;
            }
        }
        ::metrics::counter!(metrics::FRAMES_DELIVERED).increment(delivered as u64);
        tracing::debug!("Published to {}: {} deliveries", destination, delivered);
        delivered
    }

    pub fn clients_connected(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.inner
            .subscriptions
            .get(destination)
            .map_or(0, |subscribers| subscribers.len())
    }
}

/// Serve the broker on an already bound listener until the task is dropped
pub async fn serve(listener: TcpListener, state: BrokerState) -> anyhow::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Bind `addr` and serve in the background. Returns the bound address, which
/// differs from `addr` when port 0 was requested.
pub async fn spawn(addr: SocketAddr, state: BrokerState) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("Dev broker listening on {}", local);

    let task = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!("Dev broker stopped: {}", e);
        }
    });
    Ok((local, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_exact_destination_only() {
        let state = BrokerState::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        state.register(a, tx_a);
        state.register(b, tx_b);
        state.subscribe(a, "sub-0".into(), "role/USER/7".into());
        state.subscribe(b, "sub-0".into(), "role/USER".into());

        assert_eq!(state.publish("role/USER/7", "{}").await, 1);
        match rx_a.recv().await {
            Some(ServerFrame::Message {
                subscription,
                destination,
                ..
            }) => {
                assert_eq!(subscription, "sub-0");
                assert_eq!(destination, "role/USER/7");
            },
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_client_drops_subscriptions() {
        let state = BrokerState::new();
        let (tx, _rx) = mpsc::channel(8);
        let client = Uuid::new_v4();
        state.register(client, tx);
        state.subscribe(client, "sub-0".into(), "broadcast".into());
        state.subscribe(client, "sub-0".into(), "broadcast".into());
        assert_eq!(state.subscriber_count("broadcast"), 1);

        state.remove_client(client);
        assert_eq!(state.subscriber_count("broadcast"), 0);
        assert_eq!(state.clients_connected(), 0);
        assert_eq!(state.publish("broadcast", "{}").await, 0);
    }

    #[test]
    fn test_token_check() {
        assert!(BrokerState::new().accepts(None));
        let state = BrokerState::with_token("s3cret");
        assert!(state.accepts(Some("s3cret")));
        assert!(!state.accepts(Some("wrong")));
        assert!(!state.accepts(None));
    }
}
