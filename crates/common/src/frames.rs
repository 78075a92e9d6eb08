//! Pub/sub wire frames exchanged between the client transport and a broker.
//! Every frame is a JSON text message tagged by `msgType`.

use serde::{Deserialize, Serialize};

/// Protocol version sent in `Connect` and echoed in `Connected`
pub const PROTOCOL_VERSION: &str = "1.2";

/// Frames sent from client to broker
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "msgType")]
pub enum ClientFrame {
    /// Open the pub/sub session
    /// # Fields
    /// * `accept_version` - Protocol version the client speaks
    /// * `token` - Optional bearer token for brokers that authenticate
    Connect {
        accept_version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// Start receiving frames published to `destination`
    /// # Fields
    /// * `id` - Client-chosen subscription id, echoed in every `Message`
    /// * `destination` - Topic name
    Subscribe { id: String, destination: String },
    /// Stop a subscription
    /// # Fields
    /// * `id` - Id given in the matching `Subscribe`
    Unsubscribe { id: String },
    /// Publish a body to a destination
    /// # Fields
    /// * `destination` - Application-chosen destination, passed through unchanged
    /// * `body` - Opaque text body
    Send { destination: String, body: String },
    /// Graceful end of session
    Disconnect,
}

/// Frames sent from broker to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "msgType")]
pub enum ServerFrame {
    /// Handshake complete
    /// # Fields
    /// * `version` - Negotiated protocol version
    /// * `session` - Broker-assigned session id
    Connected { version: String, session: String },
    /// A frame published on a subscribed destination
    /// # Fields
    /// * `subscription` - Id of the subscription this frame is delivered for
    /// * `destination` - Topic the frame was published to
    /// * `message_id` - Broker-assigned id, unique per delivery
    /// * `body` - Opaque text body (usually a serialized envelope)
    Message {
        subscription: String,
        destination: String,
        message_id: String,
        body: String,
    },
    /// Broker-side failure; the broker may close the socket afterwards
    Error { message: String },
}
