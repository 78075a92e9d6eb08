// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared by the portal's real-time client, the dev broker and the CLI.
//! This crate defines who is connected (`Identity`), where messages are
//! addressed (`Topic`), which application message types exist
//! (`MessageKind`) and the pub/sub wire frames exchanged over the socket.

pub mod frames;
pub mod identity;
pub mod kind;
pub mod topic;

pub use frames::{ClientFrame, ServerFrame, PROTOCOL_VERSION};
pub use identity::{Identity, IdentityId, ParseRoleError, Role};
pub use kind::{Entity, MessageKind};
pub use topic::{Topic, TopicSet};
