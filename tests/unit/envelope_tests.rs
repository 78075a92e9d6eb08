// =========================
// tests/unit/envelope_tests.rs
// =========================
//! Unit tests for envelope parsing
use realtime_client::envelope::parse;
use realtime_client::{MessageKind, RawFrame};
use serde_json::{json, Value};

#[test]
fn test_malformed_frames_yield_none() {
    assert!(parse(&RawFrame::from("this is not json")).is_none());
    assert!(parse(&RawFrame::from(json!({"payload": {"id": 1}}))).is_none());
    assert!(parse(&RawFrame::from(Value::Null)).is_none());
}

#[test]
fn test_text_and_structured_frames_agree() {
    let text = parse(&RawFrame::from(r#"{"type":"REJECT_INSTITUTION","payload":{"reason":"docs"}}"#)).unwrap();
    let structured = parse(&RawFrame::from(json!({
        "type": "REJECT_INSTITUTION",
        "payload": {"reason": "docs"}
    })))
    .unwrap();

    assert_eq!(text, structured);
    assert_eq!(text.kind, MessageKind::RejectInstitution);
    assert_eq!(text.payload["reason"], "docs");
}

#[test]
fn test_unknown_type_still_parses() {
    let envelope = parse(&RawFrame::from(r#"{"type":"UNKNOWN_X"}"#)).unwrap();
    assert_eq!(envelope.kind, MessageKind::Unknown("UNKNOWN_X".to_string()));
    assert_eq!(envelope.payload, Value::Null);
}
