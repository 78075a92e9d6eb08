// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for the error module
use realtime_client::RealtimeError;

#[test]
fn test_error_display() {
    assert_eq!(
        RealtimeError::Handshake("no endpoint answered".to_string()).to_string(),
        "Handshake failed: no endpoint answered"
    );
    assert_eq!(RealtimeError::NoRuntime.to_string(), "No tokio runtime available");
}

#[test]
fn test_error_codes() {
    assert_eq!(RealtimeError::Transport("x".to_string()).error_code(), "TRN_001");
    assert_eq!(RealtimeError::InvalidSettings("x".to_string()).error_code(), "CFG_002");
    assert_eq!(RealtimeError::NoRuntime.error_code(), "RT_001");
}

#[test]
fn test_collaborator_errors_keep_context() {
    let err: RealtimeError = anyhow::anyhow!("503 from /profile")
        .context("refetching profile")
        .into();
    assert_eq!(err.error_code(), "SVC_001");
    assert!(err.to_string().contains("refetching profile"));
    assert!(err.to_string().contains("503 from /profile"));
    assert!(err.is_transient());
}
