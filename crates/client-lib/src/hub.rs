// ============================
// realtime-client/src/hub.rs
// ============================
//! Process-wide coordinator shared by every UI mount point.
//!
//! A [`RealtimeHub`] is built once at startup and cloned into whatever needs
//! it. All clones front the same [`ConnectionManager`], so any number of
//! mounts asking for "a connection for the signed-in user" end up sharing one
//! transport. Inbound envelopes are fanned out on a broadcast channel so that
//! every mount sees every message, not only the mount that connected first.
//! Mounts route only envelopes that arrived on a connection for their own
//! identity; after an identity switch an old mount sits idle until dropped.

use crate::config::Settings;
use crate::envelope::Envelope;
use crate::error::RealtimeError;
use crate::manager::{ConnectOutcome, ConnectionManager, ConnectionState};
use crate::router::{PortalServices, RoleRouter};
use realtime_common::Identity;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// An envelope and the identity whose connection delivered it
#[derive(Debug, Clone)]
struct Routed {
    identity: Identity,
    envelope: Envelope,
}

#[derive(Clone)]
pub struct RealtimeHub {
    manager: Arc<ConnectionManager>,
    events: broadcast::Sender<Envelope>,
    routed: broadcast::Sender<Routed>,
}

impl RealtimeHub {
    /// Wrap `manager`; `event_buffer` bounds how far a slow mount may lag
    pub fn new(manager: ConnectionManager, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        let (routed, _) = broadcast::channel(event_buffer.max(1));
        Self {
            manager: Arc::new(manager),
            events,
            routed,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ConnectionManager::from_settings(settings),
            settings.dispatch.event_buffer,
        )
    }

    /// The shared manager; the same `Arc` for every clone of this hub
    pub fn instance(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Connect as `identity`, fanning envelopes out to [`events`](Self::events)
    pub fn connect(&self, identity: Identity) -> ConnectOutcome {
        let events = self.events.clone();
        let routed = self.routed.clone();
        let owner = identity.clone();
        let id = identity.id.clone();
        self.manager.connect(
            identity,
            move || tracing::info!("Real-time updates live for {}", id),
            move |envelope: Envelope| {
                // No receivers just means no mount is listening right now
                let _ = events.send(envelope.clone());
                let _ = routed.send(Routed {
                    identity: owner.clone(),
                    envelope,
                });
            },
        )
    }

    /// Tear down the shared connection for every mount (e.g. on logout)
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub fn send(&self, destination: &str, body: &str) {
        self.manager.send(destination, body);
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch_state()
    }

    /// A fresh receiver of every envelope delivered from now on
    pub fn events(&self) -> broadcast::Receiver<Envelope> {
        self.events.subscribe()
    }

    /// Connect as `identity` (coalesced with other mounts) and route each
    /// inbound envelope through `router` until the handle is dropped.
    /// Envelopes delivered to another identity's connection are skipped.
    pub fn mount(
        &self,
        identity: Identity,
        router: RoleRouter,
        services: Arc<dyn PortalServices>,
    ) -> Result<MountHandle, RealtimeError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RealtimeError::NoRuntime)?;

        let mut events = self.routed.subscribe();
        let outcome = self.connect(identity.clone());
        tracing::debug!("Mounted {:?} router for {} ({:?})", router, identity.id, outcome);

        let task = runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Routed { identity: owner, envelope }) if owner.same_principal(&identity) => {
                        router.dispatch(&envelope, services.clone());
                    },
                    Ok(Routed { identity: owner, envelope }) => {
                        tracing::debug!(
                            "{:?} mount for {} skipped {} delivered to {}",
                            router,
                            identity.id,
                            envelope.kind,
                            owner.id
                        );
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("{:?} mount for {} lagged; {} envelopes skipped", router, identity.id, skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(MountHandle { outcome, task })
    }
}

/// A running mount. Dropping it stops routing for this mount only; the
/// shared connection stays up.
pub struct MountHandle {
    outcome: ConnectOutcome,
    task: JoinHandle<()>,
}

impl MountHandle {
    /// What the mount's connect call did
    pub fn outcome(&self) -> &ConnectOutcome {
        &self.outcome
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
