// ============================
// realtime-client/src/router/mod.rs
// ============================
//! Role message routers.
//!
//! Each role has a table from [`MessageKind`] to [`Action`], written as an
//! exhaustive `match` so a new kind cannot be left unrouted by accident.
//! Kinds a role does not care about, including [`MessageKind::Unknown`],
//! route to nothing.
//!
//! [`RoleRouter::dispatch`] resolves the action and hands it to the runtime
//! without awaiting it. Failures and panics in the action are logged at the
//! dispatch boundary and never reach the connection.

mod admin;
mod institution;
mod lecturer;
mod partner;
pub(crate) mod services;
mod user;

pub use services::PortalServices;

use crate::envelope::{self, Envelope, RawFrame};
use crate::error::RealtimeError;
use crate::metrics;
use futures_util::FutureExt;
use realtime_common::{Entity, MessageKind, Role};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Side effect of a routed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Re-fetch the profile and `entity`'s pending list, then reload when asked
    Refresh { entity: Entity, reload: bool },
    /// Re-fetch only `entity`'s pending list
    RefreshPending(Entity),
}

impl Action {
    /// Approval changes role-gated navigation, so it forces a reload
    pub fn approved(entity: Entity) -> Self {
        Action::Refresh { entity, reload: true }
    }

    pub fn rejected(entity: Entity) -> Self {
        Action::Refresh { entity, reload: false }
    }
}

/// Result of handing one envelope to a router
#[derive(Debug)]
pub enum Dispatch {
    /// The router has no entry for this kind, or the frame was malformed
    Ignored,
    /// The action is running; the handle completes once it has finished
    Spawned(JoinHandle<()>),
    /// The action could not be started
    Failed(RealtimeError),
}

impl Dispatch {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Dispatch::Ignored)
    }

    /// Wait for a spawned action. No-op for the other variants.
    pub async fn finished(self) {
        if let Dispatch::Spawned(handle) = self {
            let _ = handle.await;
        }
    }
}

/// Per-role routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRouter {
    User,
    Lecturer,
    Institution,
    Partner,
    Admin,
}

impl RoleRouter {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::User => RoleRouter::User,
            Role::Lecturer => RoleRouter::Lecturer,
            Role::School => RoleRouter::Institution,
            Role::Organization => RoleRouter::Partner,
            Role::Admin | Role::SubAdmin => RoleRouter::Admin,
        }
    }

    /// Look up the action for `kind`
    pub fn route(&self, kind: &MessageKind) -> Option<Action> {
        match self {
            RoleRouter::User => user::route(kind),
            RoleRouter::Lecturer => lecturer::route(kind),
            RoleRouter::Institution => institution::route(kind),
            RoleRouter::Partner => partner::route(kind),
            RoleRouter::Admin => admin::route(kind),
        }
    }

    /// Route `envelope` and start its action on the current runtime
    pub fn dispatch(&self, envelope: &Envelope, services: Arc<dyn PortalServices>) -> Dispatch {
        let action = match catch_unwind(AssertUnwindSafe(|| self.route(&envelope.kind))) {
            Ok(Some(action)) => action,
            Ok(None) => {
                if envelope.kind.is_unknown() {
                    ::metrics::counter!(metrics::DISPATCH_UNKNOWN).increment(1);
                }
                tracing::debug!("{:?} router ignores {}", self, envelope.kind);
                return Dispatch::Ignored;
            },
            Err(_) => {
                tracing::error!("{:?} router panicked on {}", self, envelope.kind);
                ::metrics::counter!(metrics::HANDLER_FAILED).increment(1);
                return Dispatch::Failed(RealtimeError::Collaborator(format!(
                    "router panicked on {}",
                    envelope.kind
                )));
            },
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("Cannot run {:?} for {}: no runtime", action, envelope.kind);
            return Dispatch::Failed(RealtimeError::NoRuntime);
        };

        let kind = envelope.kind.clone();
        tracing::debug!("{} -> {:?}", kind, action);
        Dispatch::Spawned(runtime.spawn(async move {
            match AssertUnwindSafe(action.execute(services.as_ref()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {},
                Ok(Err(err)) => {
                    let err = RealtimeError::from(err);
                    if err.is_transient() {
                        tracing::warn!("Handling {} failed [{}]: {}", kind, err.error_code(), err);
                    } else {
                        tracing::error!("Handling {} failed [{}]: {}", kind, err.error_code(), err);
                    }
                    ::metrics::counter!(metrics::HANDLER_FAILED).increment(1);
                },
                Err(_) => {
                    tracing::error!("Handler for {} panicked", kind);
                    ::metrics::counter!(metrics::HANDLER_FAILED).increment(1);
                },
            }
        }))
    }

    /// Parse `raw` and dispatch it. Malformed frames are ignored.
    pub fn dispatch_raw(&self, raw: &RawFrame, services: Arc<dyn PortalServices>) -> Dispatch {
        match envelope::parse(raw) {
            Some(envelope) => self.dispatch(&envelope, services),
            None => {
                tracing::warn!("Dropping malformed frame: {:?}", raw);
                ::metrics::counter!(metrics::FRAME_DROPPED).increment(1);
                Dispatch::Ignored
            },
        }
    }
}
