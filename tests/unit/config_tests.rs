// =========================
// tests/unit/config_tests.rs
// =========================
//! Unit tests for settings loading
use realtime_client::Settings;
use std::io::Write;
use tempfile::NamedTempFile;

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = settings_file(
        r#"
[transport]
endpoints = ["ws://portal.example/ws", "ws://fallback.example/ws"]
"#,
    );
    let settings = Settings::load_from(file.path()).unwrap();

    assert_eq!(settings.transport.endpoints.len(), 2);
    assert_eq!(settings.transport.handshake_timeout_ms, 5000);
    assert!(settings.reconnect.enabled);
}

#[test]
fn test_invalid_multiplier_is_rejected() {
    let file = settings_file(
        r#"
[reconnect]
multiplier = 0.5
"#,
    );
    let err = Settings::load_from(file.path()).unwrap_err();
    assert_eq!(err.error_code(), "CFG_002");
}

#[test]
fn test_backoff_is_capped() {
    let settings = Settings::default();
    let delays: Vec<u128> = (0..12)
        .map(|attempt| settings.reconnect.delay_for_attempt(attempt).as_millis())
        .collect();

    assert_eq!(delays[0], 1000);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*delays.last().unwrap(), 30_000);
}
