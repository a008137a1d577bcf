//! # Configuration
//!
//! Explicit configuration shared by the Drive, Mail and Sheets services. It replaces any
//! process-wide state: build a [`GapiConfig`] once (programmatically or with
//! [`GapiConfig::load`]) and hand it to each service constructor.
//!
//! Loading is layered:
//! 1. Programmatic defaults (retry policy, public Google endpoints).
//! 2. An optional YAML file.
//! 3. `GAPI_`-prefixed environment variables, with `__` separating nested keys
//!    (e.g. `GAPI_SHEETS__CACHE_DIR`, `GAPI_RETRY__DELAY_SECS`).

use crate::constants::{DOCS_URL, DRIVE_API_URL, DRIVE_UPLOAD_URL, GMAIL_API_URL, SHEETS_API_URL};
use crate::errors::{GapiError, GapiResult};
use crate::retry::RetryPolicy;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// The root configuration structure, mapping directly to a `gapi.yml` file.
#[derive(Debug, Deserialize, Clone)]
pub struct GapiConfig {
    /// Path to the service-account JSON key file.
    pub credentials: PathBuf,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Settings specific to Google Sheets.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SheetsConfig {
    /// Directory where spreadsheet metadata is cached between runs.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Directory where downloaded sheets are stored as dated CSV files.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// Spreadsheet holding the sheet used instead of real destinations when testing.
    #[serde(default)]
    pub test_spreadsheet_id: Option<String>,
    #[serde(default)]
    pub test_sheet_name: Option<String>,
    /// Redirects every write to the test sheet.
    #[serde(default)]
    pub force_test_spreadsheet: bool,
}

/// Settings specific to Gmail.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MailConfig {
    /// Recipient used instead of the real one when `force_test_email` is set.
    #[serde(default)]
    pub to_test: Option<String>,
    #[serde(default)]
    pub force_test_email: bool,
}

/// Base URLs of the Google APIs. Overridden in tests to point at a mock server.
#[derive(Debug, Deserialize, Clone)]
pub struct Endpoints {
    #[serde(default = "default_sheets_api")]
    pub sheets_api: String,
    #[serde(default = "default_docs")]
    pub docs: String,
    #[serde(default = "default_drive_api")]
    pub drive_api: String,
    #[serde(default = "default_drive_upload")]
    pub drive_upload: String,
    #[serde(default = "default_gmail_api")]
    pub gmail_api: String,
}

fn default_sheets_api() -> String {
    SHEETS_API_URL.to_string()
}

fn default_docs() -> String {
    DOCS_URL.to_string()
}

fn default_drive_api() -> String {
    DRIVE_API_URL.to_string()
}

fn default_drive_upload() -> String {
    DRIVE_UPLOAD_URL.to_string()
}

fn default_gmail_api() -> String {
    GMAIL_API_URL.to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sheets_api: default_sheets_api(),
            docs: default_docs(),
            drive_api: default_drive_api(),
            drive_upload: default_drive_upload(),
            gmail_api: default_gmail_api(),
        }
    }
}

impl Endpoints {
    /// Routes every API to a single host, e.g. a local mock server.
    ///
    /// Uploads go to `<base>/upload` so they do not collide with plain Drive calls.
    pub fn with_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            sheets_api: base.to_string(),
            docs: base.to_string(),
            drive_api: base.to_string(),
            drive_upload: format!("{base}/upload"),
            gmail_api: base.to_string(),
        }
    }
}

impl GapiConfig {
    /// Creates a configuration with defaults for everything but the credentials path.
    pub fn new(credentials: impl Into<PathBuf>) -> Self {
        Self {
            credentials: credentials.into(),
            sheets: SheetsConfig::default(),
            mail: MailConfig::default(),
            retry: RetryPolicy::default(),
            endpoints: Endpoints::default(),
        }
    }

    /// Loads the configuration from an optional YAML file and `GAPI_*` environment variables.
    ///
    /// When `path` is given the file must exist.
    pub fn load(path: Option<&Path>) -> GapiResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(GapiError::Configuration(format!(
                    "Config file not found at '{}'",
                    path.display()
                )));
            }
            info!("Loading configuration from '{}'.", path.display());
            let content = std::fs::read_to_string(path)?;
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("GAPI")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.retry.validate()?;
        Ok(config)
    }

    /// Returns the backup directory, which must be configured and exist.
    pub fn backup_location(&self) -> GapiResult<&Path> {
        existing_dir(self.sheets.backup_dir.as_deref())
            .ok_or_else(|| GapiError::Configuration("Backup location is not configured".into()))
    }

    /// Returns the cache directory, if configured and present.
    pub fn cache_location(&self) -> Option<&Path> {
        existing_dir(self.sheets.cache_dir.as_deref())
    }
}

fn existing_dir(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| p.is_dir())
}
