// ==============
// crates/client-lib/src/metrics.rs

//! Central place for metric keys
pub const TRANSPORT_CREATED: &str = "realtime.transport.created";
pub const CONNECT_COALESCED: &str = "realtime.connect.coalesced";
pub const CONNECT_REPLACED: &str = "realtime.connect.replaced";
pub const FRAME_DROPPED: &str = "realtime.frame.dropped";
pub const RECONNECT_SCHEDULED: &str = "realtime.reconnect.scheduled";
pub const DISPATCH_UNKNOWN: &str = "realtime.dispatch.unknown";
pub const HANDLER_FAILED: &str = "realtime.handler.failed";
