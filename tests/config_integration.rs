use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;
use water_portal_gateway::config::{AppConfig, Command};

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("PORTAL_API__BASE_URL");
        env::remove_var("PORTAL_API__REFRESH_TIMEOUT_SECS");
        env::remove_var("PORTAL_SESSION__REQUIRED_ROLE");
        env::remove_var("PORTAL_STORE_PATH");
        env::remove_var("PORTAL_REQUIRED_ROLE");
        env::remove_var("API_BASE_URL");
        env::remove_var("CONFIG_FILE");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let (cli, config) = AppConfig::load_from_args(["water-portal"]).expect("Failed to load config");

    assert!(cli.command.is_none());
    assert_eq!(config.api.base_url, "http://localhost:5000/api");
    assert_eq!(config.api.refresh_path, "/account/refresh-token");
    assert_eq!(config.session.required_role.as_deref(), Some("Admin"));
    assert_eq!(config.routes.login, "/");
    assert_eq!(config.routes.unauthorized, "/Unauthorized");

    let settings = config.gateway_settings();
    assert_eq!(settings.refresh_timeout, Some(Duration::from_secs(30)));
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("PORTAL_API__BASE_URL", "http://portal.test/api");
        env::set_var("PORTAL_API__REFRESH_TIMEOUT_SECS", "0");
    }

    let (_, config) = AppConfig::load_from_args(["water-portal"]).expect("Failed to load config");
    assert_eq!(config.api.base_url, "http://portal.test/api");
    assert_eq!(config.gateway_settings().refresh_timeout, None);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("portal.yaml");
    let config_content = r#"
api:
  base_url: "http://file.test/api"
  request_timeout_secs: 5
session:
  store_path: "/tmp/water-portal-test/session.json"
routes:
  unauthorized: "/denied"
    "#;
    fs::write(&file_path, config_content).expect("Failed to write temp config");

    let (_, config) =
        AppConfig::load_from_args(["water-portal", "--config", file_path.to_str().unwrap()])
            .expect("Failed to load config from file");

    assert_eq!(config.api.base_url, "http://file.test/api");
    assert_eq!(
        config.gateway_settings().request_timeout,
        Some(Duration::from_secs(5))
    );
    assert_eq!(
        config.store_path().to_str(),
        Some("/tmp/water-portal-test/session.json")
    );
    assert_eq!(config.routes.unauthorized, "/denied");
    assert_eq!(config.routes.login, "/");
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env_vars();
    unsafe {
        env::set_var("PORTAL_API__BASE_URL", "http://env.test/api");
    }

    let (cli, config) = AppConfig::load_from_args([
        "water-portal",
        "--base-url",
        "http://cli.test/api",
        "--required-role",
        "none",
        "schedules",
        "--date",
        "2024-05-01",
    ])
    .expect("Failed to load config");

    assert_eq!(config.api.base_url, "http://cli.test/api");
    assert_eq!(config.gateway_settings().required_role, None);
    assert_eq!(
        cli.command,
        Some(Command::Schedules {
            date: Some("2024-05-01".into())
        })
    );

    clear_env_vars();
}
