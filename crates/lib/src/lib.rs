//! # gapi-helper
//!
//! Shared plumbing for the `gapi-helper` workspace: explicit configuration, service-account
//! authentication, an authenticated HTTP client with retries, and the error taxonomy used
//! by the Drive, Mail and Sheets crates.

pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod retry;

pub use auth::{
    ServiceAccountCredentials, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider,
};
pub use client::{Access, ApiClient, NO_QUERY};
pub use config::{Endpoints, GapiConfig, MailConfig, SheetsConfig};
pub use errors::{GapiError, GapiResult};
pub use retry::RetryPolicy;
