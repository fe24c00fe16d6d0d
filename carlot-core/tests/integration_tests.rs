//! Integration tests for carlot-core infrastructure

use carlot_core::{config_error, validation_error, CarlotConfig, CarlotError, LogFormat};

#[test]
fn test_error_macros_carry_context() {
    let error = validation_error!("Email is invalid", "email", "users");

    match &error {
        CarlotError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Email is invalid");
            assert_eq!(field.as_deref(), Some("email"));
            assert_eq!(context.component, "users");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }
    assert_eq!(error.field(), Some("email"));

    // Logging without a subscriber must not panic
    error.log();

    let config = config_error!("Missing secret", "bootstrap");
    assert!(config.context().is_some());
    assert!(config.field().is_none());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carlot.toml");

    let mut config = CarlotConfig::default();
    config.server.port = 4100;
    config.session.secret = "file-session-secret".to_string();
    config.token.secret = "file-token-secret-0123456789".to_string();
    config.logging.format = LogFormat::Json;
    config.save_to_file(&path).unwrap();

    let loaded = CarlotConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.port, 4100);
    assert_eq!(loaded.session.cookie_name, "carlot.sid");
    assert_eq!(loaded.logging.format, LogFormat::Json);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
[token]
secret = "partial-token-secret-123"
validity_days = 7
"#,
    )
    .unwrap();

    let loaded = CarlotConfig::from_file(&path).unwrap();
    assert_eq!(loaded.token.validity_days, 7);
    assert_eq!(loaded.server.host, "127.0.0.1");
    assert_eq!(loaded.session.max_age_secs, 24 * 60 * 60);
}

#[test]
fn test_missing_config_file() {
    let result = CarlotConfig::from_file("/definitely/not/here.toml");
    assert!(matches!(result, Err(CarlotError::Config { .. })));
}
