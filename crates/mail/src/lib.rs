//! # gapi-helper-mail: Gmail Helpers
//!
//! Builds plain-text MIME messages (with an optional attachment) and sends them through the
//! Gmail API on behalf of a delegated sender.

pub mod message;
pub mod service;

pub use message::{Attachment, MailMessage};
pub use service::MailService;
