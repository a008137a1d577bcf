//! # MIME Messages
//!
//! A deliberately small RFC 5322 / MIME writer: one `text/plain` body and at most one
//! base64-encoded attachment.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gapi_helper::{GapiError, GapiResult};
use std::path::Path;

const LINE_WIDTH: usize = 76;

/// Raw bytes carried by one RFC 2047 encoded-word, keeping it within 75 characters.
const ENCODED_WORD_BYTES: usize = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Reads an attachment from disk.
    ///
    /// The content type is guessed from the file name, then falls back to `fallback_type`
    /// and finally to `application/octet-stream`.
    pub fn from_path(path: &Path, fallback_type: Option<&str>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self {
            content_type: guess_content_type(path, fallback_type),
            filename,
            data,
        })
    }
}

fn guess_content_type(path: &Path, fallback_type: Option<&str>) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .or_else(|| fallback_type.map(String::from))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// An email ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

impl MailMessage {
    /// Rejects header values containing line breaks, which would start new headers.
    pub fn check_headers(&self) -> GapiResult<()> {
        let headers = [
            ("To", Some(self.to.as_str())),
            ("From", Some(self.from.as_str())),
            ("Reply-To", self.reply_to.as_deref()),
            ("Subject", Some(self.subject.as_str())),
        ];
        let cc = self.cc.iter().map(|cc| ("CC", Some(cc.as_str())));
        let filename = self
            .attachment
            .as_ref()
            .map(|a| ("Attachment filename", Some(a.filename.as_str())));

        for (name, value) in headers.into_iter().chain(cc).chain(filename) {
            if value.is_some_and(|v| v.contains(['\r', '\n'])) {
                return Err(GapiError::Addressing(format!(
                    "Header value for {name} contains a line break"
                )));
            }
        }
        Ok(())
    }

    /// Serializes the message, using `boundary` to separate parts when there is an attachment.
    pub fn to_bytes(&self, boundary: &str) -> Vec<u8> {
        let mut out = String::new();
        push_header(&mut out, "To", &self.to);
        push_header(&mut out, "From", &self.from);
        if let Some(reply_to) = &self.reply_to {
            push_header(&mut out, "Reply-To", reply_to);
        }
        if !self.cc.is_empty() {
            push_header(&mut out, "CC", &self.cc.join(","));
        }
        push_header(&mut out, "Subject", &encode_header_value(&self.subject));
        push_header(&mut out, "MIME-Version", "1.0");

        match &self.attachment {
            None => {
                push_text_part(&mut out, &self.body);
            }
            Some(attachment) => {
                push_header(
                    &mut out,
                    "Content-Type",
                    &format!("multipart/mixed; boundary=\"{boundary}\""),
                );
                out.push_str("\r\n");
                out.push_str(&format!("--{boundary}\r\n"));
                push_text_part(&mut out, &self.body);
                out.push_str(&format!("--{boundary}\r\n"));
                push_header(&mut out, "Content-Type", &attachment.content_type);
                push_header(&mut out, "Content-Transfer-Encoding", "base64");
                push_header(
                    &mut out,
                    "Content-Disposition",
                    &content_disposition(&attachment.filename),
                );
                out.push_str("\r\n");
                let encoded = STANDARD.encode(&attachment.data);
                for line in encoded.as_bytes().chunks(LINE_WIDTH) {
                    // Base64 output is ASCII.
                    out.push_str(&String::from_utf8_lossy(line));
                    out.push_str("\r\n");
                }
                out.push_str(&format!("--{boundary}--\r\n"));
            }
        }
        out.into_bytes()
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn push_text_part(out: &mut String, body: &str) {
    push_header(out, "Content-Type", "text/plain; charset=\"utf-8\"");
    push_header(out, "Content-Transfer-Encoding", "8bit");
    out.push_str("\r\n");
    for line in body.lines() {
        out.push_str(line);
        out.push_str("\r\n");
    }
}

/// RFC 2047 encoding for header values that are not plain ASCII.
///
/// Long values are split into several encoded-words on folded lines.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?utf-8?b?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?b?{}?=", STANDARD.encode(&chunk)));
    }
    words.join("\r\n ")
}

/// Non-ASCII file names use the RFC 2231 `filename*` parameter.
fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        format!("attachment; filename=\"{}\"", filename.replace('"', "\\\""))
    } else {
        format!("attachment; filename*=utf-8''{}", urlencoding::encode(filename))
    }
}
