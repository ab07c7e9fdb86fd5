//! Daemon wiring from a configuration, in simulation mode.

use std::net::TcpListener;

use arcomd::config::Config;
use arcomd::daemon::Daemon;
use arcomd::error::StartupError;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.password_file = dir.path().join("arcom.passwd").display().to_string();
    config.server.pid_file = Some(dir.path().join("arcomd.pid").display().to_string());
    config.storage.history_file = dir.path().join("arcom.history").display().to_string();
    config.serial.device = "/dev/does-not-exist".to_string();
    config
}

#[tokio::test]
async fn simulated_daemon_starts_and_holds_the_pid_lock() {
    if TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("skipping test: cannot bind local port");
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let daemon = Daemon::start(&config, true).unwrap();
    assert_ne!(daemon.local_addr().port(), 0);
    let status = daemon.controller().status().await;
    assert!(status.simulation);
    assert_eq!(status.identity, config.server.identity);

    let outcome = daemon.controller().disable("N0CALL", 0).await;
    assert!(outcome.succeeded);
    assert_eq!(outcome.message, "TESTING MODE");
    daemon.controller().audit().flush();
    assert!(dir.path().join("arcom.history").exists());

    match Daemon::start(&config, true) {
        Err(err @ StartupError::PidLock { .. }) => assert_eq!(err.exit_code(), 99),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second daemon started"),
    }
}

#[tokio::test]
async fn invalid_configuration_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.server.identity = String::new();

    match Daemon::start(&config, true) {
        Err(err @ StartupError::Config(_)) => assert_eq!(err.exit_code(), 2),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("started with an empty identity"),
    }
    assert!(!dir.path().join("arcomd.pid").exists());
}
