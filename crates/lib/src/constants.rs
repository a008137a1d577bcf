//! # Shared Constants
//!
//! Default endpoints and OAuth scopes used by the Drive, Gmail and Sheets services.
//! Endpoints can be overridden through [`crate::config::Endpoints`].

/// Base URL of the Sheets v4 REST API.
pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

/// Host serving the CSV export of a spreadsheet tab.
pub const DOCS_URL: &str = "https://docs.google.com";

/// Base URL of the Drive v3 REST API.
pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL of the Drive v3 upload endpoint.
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Base URL of the Gmail v1 REST API.
pub const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1";

pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://spreadsheets.google.com/feeds",
    "https://docs.google.com/feeds",
];

pub const DRIVE_SCOPES: &[&str] = &[
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.metadata",
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive.appdata",
    "https://www.googleapis.com/auth/drive.file",
];

pub const MAIL_SCOPES: &[&str] = &[
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
];

/// Grant type of the OAuth2 JWT-bearer flow used by service accounts.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
