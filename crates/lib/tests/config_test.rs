//! # Configuration Loading Tests

use anyhow::Result;
use gapi_helper::{GapiConfig, GapiError, RetryPolicy};
use serial_test::serial;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const ENV_KEYS: &[&str] = &[
    "GAPI_CREDENTIALS",
    "GAPI_RETRY__MAX_FAILURES",
    "GAPI_RETRY__BACKOFF",
    "GAPI_MAIL__FORCE_TEST_EMAIL",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_load_from_yaml_file() -> Result<()> {
    clear_env();
    let backups = tempdir()?;
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
credentials: /secrets/robot.json
sheets:
  backup_dir: {}
  test_spreadsheet_id: test-sheet-id
  test_sheet_name: Sandbox
mail:
  to_test: qa@example.com
retry:
  delay_secs: 0.5
"#,
        backups.path().display()
    )?;

    let config = GapiConfig::load(Some(file.path()))?;

    assert_eq!(config.credentials.to_str(), Some("/secrets/robot.json"));
    assert_eq!(config.sheets.test_spreadsheet_id.as_deref(), Some("test-sheet-id"));
    assert_eq!(config.mail.to_test.as_deref(), Some("qa@example.com"));
    assert!(!config.mail.force_test_email);
    assert_eq!(config.retry.delay_secs, 0.5);
    assert_eq!(config.retry.max_failures, RetryPolicy::default().max_failures);
    assert_eq!(config.backup_location()?, backups.path());
    assert!(config.cache_location().is_none());
    assert_eq!(config.endpoints.sheets_api, "https://sheets.googleapis.com/v4");
    Ok(())
}

#[test]
#[serial]
fn test_environment_overrides_file() -> Result<()> {
    clear_env();
    let mut file = NamedTempFile::new()?;
    writeln!(file, "credentials: /secrets/robot.json\nretry:\n  max_failures: 2")?;

    std::env::set_var("GAPI_RETRY__MAX_FAILURES", "9");
    std::env::set_var("GAPI_MAIL__FORCE_TEST_EMAIL", "true");
    let config = GapiConfig::load(Some(file.path()));
    clear_env();

    let config = config?;
    assert_eq!(config.retry.max_failures, 9);
    assert!(config.mail.force_test_email);
    Ok(())
}

#[test]
#[serial]
fn test_missing_file_and_backup_dir_are_configuration_errors() {
    clear_env();
    let err = GapiConfig::load(Some(std::path::Path::new("/nonexistent/gapi.yml"))).unwrap_err();
    assert!(matches!(err, GapiError::Configuration(_)));

    let config = GapiConfig::new("/secrets/robot.json");
    let err = config.backup_location().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: Backup location is not configured"
    );
}

#[test]
#[serial]
fn test_unusable_retry_settings_are_configuration_errors() -> Result<()> {
    clear_env();
    let mut file = NamedTempFile::new()?;
    writeln!(file, "credentials: /secrets/robot.json\nretry:\n  delay_secs: -2.0")?;
    let err = GapiConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("retry.delay_secs"));

    let mut file = NamedTempFile::new()?;
    writeln!(file, "credentials: /secrets/robot.json")?;
    std::env::set_var("GAPI_RETRY__BACKOFF", "-1.5");
    let result = GapiConfig::load(Some(file.path()));
    clear_env();

    assert!(matches!(result, Err(GapiError::Configuration(msg)) if msg.contains("retry.backoff")));
    Ok(())
}
