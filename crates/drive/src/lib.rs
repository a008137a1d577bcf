//! # gapi-helper-drive: Google Drive Helpers
//!
//! [`DriveService`] binds an authenticated client to one (optionally delegated) user.
//! [`File`] and [`Folder`] are lightweight handles on Drive items that carry the service
//! they were created from.

pub mod file;
pub mod service;

pub use file::{File, Folder, Role};
pub use service::{DriveFile, DriveService, FOLDER_MIME_TYPE, SPREADSHEET_MIME_TYPE};
