// ============================
// realtime-cli/src/console.rs
// ============================
//! Collaborators that print what a dashboard would do.

use async_trait::async_trait;
use realtime_client::{Entity, Identity, PortalServices};
use serde_json::Value;

pub struct ConsoleServices {
    identity: Identity,
}

impl ConsoleServices {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl PortalServices for ConsoleServices {
    async fn fetch_profile(&self) -> anyhow::Result<Identity> {
        tracing::info!("would refetch profile of {}", self.identity.id);
        Ok(self.identity.clone())
    }

    async fn fetch_pending_requests(&self, entity: Entity) -> anyhow::Result<Vec<Value>> {
        tracing::info!("would refetch pending {} requests", entity);
        Ok(Vec::new())
    }

    fn store_profile(&self, profile: Identity) {
        println!("profile: {} ({})", profile.id, profile.role);
    }

    fn store_pending_requests(&self, entity: Entity, requests: Vec<Value>) {
        println!("pending {}: {} requests", entity, requests.len());
    }

    fn reload(&self) {
        println!("reload requested");
    }
}
