// ============================
// realtime-client/src/router/services.rs
// ============================
//! Collaborators the routers act on, and the code that runs an [`Action`]
//! against them.

use super::Action;
use async_trait::async_trait;
use realtime_common::{Entity, Identity};
use serde_json::Value;

/// The portal's side of a routed message.
///
/// Fetches are asynchronous request/response calls to the portal API;
/// `store_*` publish a new snapshot into the UI's shared state and
/// `reload` re-evaluates role-gated navigation from scratch.
#[async_trait]
pub trait PortalServices: Send + Sync + 'static {
    /// Re-fetch the signed-in identity's profile
    async fn fetch_profile(&self) -> anyhow::Result<Identity>;

    /// Re-fetch the pending request list for `entity`
    async fn fetch_pending_requests(&self, entity: Entity) -> anyhow::Result<Vec<Value>>;

    fn store_profile(&self, profile: Identity);

    fn store_pending_requests(&self, entity: Entity, requests: Vec<Value>);

    fn reload(&self);
}

impl Action {
    /// Run this action to completion against `services`
    pub async fn execute(self, services: &dyn PortalServices) -> anyhow::Result<()> {
        match self {
            Action::Refresh { entity, reload } => {
                let profile = services.fetch_profile().await?;
                tracing::debug!("Refetched profile {} ({})", profile.id, profile.role);
                services.store_profile(profile);

                let requests = services.fetch_pending_requests(entity).await?;
                services.store_pending_requests(entity, requests);

                if reload {
                    tracing::info!("{} approved; reloading", entity);
                    services.reload();
                }
            },
            Action::RefreshPending(entity) => {
                let requests = services.fetch_pending_requests(entity).await?;
                tracing::debug!("{} pending {} requests", requests.len(), entity);
                services.store_pending_requests(entity, requests);
            },
        }
        Ok(())
    }
}
