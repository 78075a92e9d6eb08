// ============================
// realtime-dev-broker/src/metrics.rs
// ============================

pub const WS_CONNECTIONS: &str = "broker.ws.connections";
pub const WS_ACTIVE: &str = "broker.ws.active";
pub const FRAMES_PUBLISHED: &str = "broker.frames.published";
pub const FRAMES_DELIVERED: &str = "broker.frames.delivered";
pub const FRAMES_REJECTED: &str = "broker.frames.rejected";
