//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::{Ipv4Addr, SocketAddrV4};

use peerwire::config::{PeerConfiguration, DEFAULT_BACKLOG, DEFAULT_BUFFER_SIZE};
use peerwire::error::NetError;
use serial_test::serial;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = PeerConfiguration::new("com.example.game").unwrap();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_every_problem_is_reported() {
    let mut config = PeerConfiguration::new("app").unwrap();
    config.app_identifier = String::new();
    config.backlog = 0;
    config.receive_buffer_size = 0;
    config.multicast_address = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 222), 0);

    let errors = config.validate();
    assert_eq!(errors.len(), 4, "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("empty")));
    assert!(errors.iter().any(|e| e.contains("Backlog")));
    assert!(errors.iter().any(|e| e.contains("Receive buffer")));
    assert!(errors.iter().any(|e| e.contains("port")));

    let err = config.validate_strict().unwrap_err();
    assert!(matches!(err, NetError::ConfigError(_)));
}

#[test]
fn test_invalid_toml_rejected() {
    assert!(matches!(
        PeerConfiguration::from_toml("app_identifier = 5"),
        Err(NetError::ConfigError(_))
    ));
    assert!(matches!(
        PeerConfiguration::from_toml(r#"app_identifier = """#),
        Err(NetError::ConfigError(_))
    ));
    assert!(matches!(
        PeerConfiguration::from_toml(
            r#"
            app_identifier = "ok"
            [logging]
            log_level = "loud"
            ansi = true
            thread_names = true
            "#
        ),
        Err(NetError::ConfigError(_))
    ));
}

#[test]
fn test_save_and_reload() {
    let mut config = PeerConfiguration::new("file.app").unwrap();
    config.listening_port = 9123;
    config.backlog = 64;
    config.logging.log_level = Level::TRACE;

    let path = std::env::temp_dir().join(format!("peerwire-config-{}.toml", std::process::id()));
    config.save_to_file(&path).unwrap();
    let loaded = PeerConfiguration::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file() {
    let err = PeerConfiguration::from_file("/nonexistent/peerwire.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
#[serial]
fn test_env_overrides() {
    std::env::set_var("PEERWIRE_LISTENING_PORT", "7001");
    std::env::set_var("PEERWIRE_BUFFER_SIZE", "65536");
    std::env::set_var("PEERWIRE_MULTICAST_ADDRESS", "239.1.2.3:4000");
    std::env::set_var("PEERWIRE_MULTICAST_LISTEN", "true");

    let config = PeerConfiguration::from_env("env.app");

    std::env::remove_var("PEERWIRE_LISTENING_PORT");
    std::env::remove_var("PEERWIRE_BUFFER_SIZE");
    std::env::remove_var("PEERWIRE_MULTICAST_ADDRESS");
    std::env::remove_var("PEERWIRE_MULTICAST_LISTEN");

    let config = config.unwrap();
    assert_eq!(config.listening_port, 7001);
    assert_eq!(config.receive_buffer_size, 65536);
    assert_eq!(config.send_buffer_size, 65536);
    assert_eq!(config.multicast_address.to_string(), "239.1.2.3:4000");
    assert!(config.multicast_listen);
    assert_eq!(config.backlog, DEFAULT_BACKLOG);
}

#[test]
#[serial]
fn test_env_defaults_and_bad_values() {
    let config = PeerConfiguration::from_env("env.defaults").unwrap();
    assert_eq!(config.receive_buffer_size, DEFAULT_BUFFER_SIZE);

    std::env::set_var("PEERWIRE_LISTENING_PORT", "not-a-port");
    let result = PeerConfiguration::from_env("env.bad");
    std::env::remove_var("PEERWIRE_LISTENING_PORT");
    assert!(matches!(result, Err(NetError::ConfigError(_))));
}
