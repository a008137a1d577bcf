//! # Authenticated API Client
//!
//! A thin wrapper around `reqwest` that attaches bearer tokens, maps HTTP failures into
//! [`GapiError::RemoteRead`] / [`GapiError::RemoteWrite`], and retries through
//! [`crate::retry::execute`].

use crate::auth::{ServiceAccountCredentials, ServiceAccountTokenProvider, TokenProvider};
use crate::errors::{GapiError, GapiResult};
use crate::retry::{self, RetryPolicy};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An empty query string, for calls that take no parameters.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Whether a call reads or writes remote state. Decides which error variant a failure
/// turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn error(self, status: Option<u16>, message: impl Into<String>) -> GapiError {
        let message = message.into();
        match self {
            Access::Read => GapiError::RemoteRead { status, message },
            Access::Write => GapiError::RemoteWrite { status, message },
        }
    }
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GoogleErrorDetail {
    Structured { message: String },
    Plain(String),
}

/// Extracts the human-readable message from a Google error payload.
fn error_message(body: &str) -> Option<String> {
    let parsed: GoogleErrorBody = serde_json::from_str(body).ok()?;
    Some(match parsed.error {
        GoogleErrorDetail::Structured { message } => message,
        GoogleErrorDetail::Plain(message) => message,
    })
}

/// An HTTP client bound to one identity's delegated access.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("identity", &self.tokens.identity())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ApiClient {
    pub fn new(tokens: Arc<dyn TokenProvider>, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            retry,
        }
    }

    /// Builds a client that authenticates as a service account.
    ///
    /// `subject` impersonates a user of the domain (domain-wide delegation).
    pub fn service_account(
        credentials: &ServiceAccountCredentials,
        scopes: &[&str],
        subject: Option<&str>,
        retry: RetryPolicy,
    ) -> Self {
        let tokens = ServiceAccountTokenProvider::new(credentials.clone(), scopes, subject);
        Self::new(Arc::new(tokens), retry)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The identity behind the tokens (the service account email), when known.
    pub fn identity(&self) -> Option<&str> {
        self.tokens.identity()
    }

    /// Drops the cached access token.
    pub async fn reset(&self) {
        self.tokens.reset().await;
    }

    /// Sends a single authenticated request and checks its status, without retrying.
    pub async fn send_once<F>(&self, access: Access, build: F) -> GapiResult<Response>
    where
        F: FnOnce(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&self.http)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| access.error(None, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Request failed with status {status}: {body}");
        let message = error_message(&body).unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });
        Err(access.error(Some(status.as_u16()), message))
    }

    /// Sends an authenticated request, retrying according to the client's policy.
    ///
    /// `build` is called once per attempt. A 401 drops the cached token before the next
    /// attempt.
    pub async fn send<F>(&self, access: Access, build: F) -> GapiResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let this = self;
        let build = &build;
        retry::execute(&self.retry, move || async move {
            let result = this.send_once(access, build).await;
            if let Err(e) = &result {
                if e.is_unauthorized() {
                    this.reset().await;
                }
            }
            result
        })
        .await
    }

    /// GETs a URL and decodes the JSON response.
    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> GapiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .send(Access::Read, |http| http.get(url).query(query))
            .await?;
        decode(Access::Read, response).await
    }

    /// Sends a JSON body and decodes the JSON response.
    pub async fn send_json<T, Q, B>(
        &self,
        access: Access,
        method: Method,
        url: &str,
        query: &Q,
        body: &B,
    ) -> GapiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let response = self
            .send(access, |http| {
                http.request(method.clone(), url).query(query).json(body)
            })
            .await?;
        decode(access, response).await
    }

    /// DELETEs a URL, ignoring the response body.
    pub async fn delete(&self, url: &str) -> GapiResult<()> {
        self.send(Access::Write, |http| http.delete(url)).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(access: Access, response: Response) -> GapiResult<T> {
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| access.error(Some(status), format!("Invalid response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("The caller does not have permission")
        );

        let oauth = r#"{"error": "invalid_grant", "error_description": "Invalid JWT"}"#;
        assert_eq!(error_message(oauth).as_deref(), Some("invalid_grant"));

        assert_eq!(error_message("<html>oops</html>"), None);
    }
}
