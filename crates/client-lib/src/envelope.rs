//! Message envelope parsing.
//!
//! Inbound frames arrive either as serialized text or as an already
//! structured JSON value. Both normalize to an [`Envelope`] whose `type` is
//! decoded into a [`MessageKind`] at this boundary. Frames that are not
//! structured data, or lack a non-empty `type`, are dropped here and never
//! reach a router.

use realtime_common::MessageKind;
use serde::Deserialize;
use serde_json::Value;

/// A frame as delivered by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    /// Serialized text, usually JSON
    Text(String),
    /// Pre-structured payload (`Value::Null` for an absent frame)
    Json(Value),
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        RawFrame::Text(text.to_string())
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        RawFrame::Text(text)
    }
}

impl From<Value> for RawFrame {
    fn from(value: Value) -> Self {
        RawFrame::Json(value)
    }
}

/// Typed `{type, payload}` wrapper around one inbound frame.
/// Lives for a single dispatch; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: MessageKind,
    pub payload: Value,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Wire name of the message type
    pub fn type_name(&self) -> String {
        self.kind.as_wire().into_owned()
    }

    /// Serialize back to the `{type, payload}` text form
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "type": self.kind.as_wire(),
            "payload": self.payload,
        })
        .to_string()
    }
}

/// Normalize a raw frame into an envelope. Returns `None` for anything that
/// is not a JSON object with a non-empty string `type`.
pub fn parse(raw: &RawFrame) -> Option<Envelope> {
    let value = match raw {
        RawFrame::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Frame is not structured data: {}", e);
                return None;
            },
        },
        RawFrame::Json(value) => value.clone(),
    };

    if !value.is_object() {
        return None;
    }

    let wire: WireEnvelope = serde_json::from_value(value).ok()?;
    let name = wire.kind?;
    if name.is_empty() {
        return None;
    }

    Some(Envelope {
        kind: MessageKind::from_wire(&name),
        payload: wire.payload,
    })
}
