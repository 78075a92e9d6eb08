// ============================
// realtime-client/src/lib.rs
// ============================
//! Real-time connection and message routing for the portal's dashboards.
//!
//! One multiplexed pub/sub connection per signed-in identity, shared by every
//! UI mount point through a [`RealtimeHub`]. Inbound frames are parsed into
//! [`Envelope`]s and routed by a [`RoleRouter`] to the portal's collaborators.
//!
//! ```text
//!  mount point ─┐
//!  mount point ─┼─► RealtimeHub ─► ConnectionManager ─► Transport (ws / loopback)
//!  mount point ─┘        ▲                                   │ frames
//!                        └──── broadcast<Envelope> ◄── parse ┘
//!                                     │
//!                                     ▼
//!                        RoleRouter::dispatch ─► PortalServices
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod manager;
pub mod metrics;
pub mod router;
pub mod transport;

pub use crate::config::Settings;
pub use crate::envelope::{Envelope, RawFrame};
pub use crate::error::RealtimeError;
pub use crate::hub::{MountHandle, RealtimeHub};
pub use crate::manager::{ConnectOutcome, ConnectionManager, ConnectionState};
pub use crate::router::{Action, Dispatch, PortalServices, RoleRouter};
pub use crate::transport::{Transport, TransportFactory};
pub use realtime_common::{Entity, Identity, IdentityId, MessageKind, Role, Topic, TopicSet};
