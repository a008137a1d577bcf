//! # Credentials and Access Tokens
//!
//! Service-account keys are loaded once with [`ServiceAccountCredentials::from_file`];
//! an unreadable or malformed key is a configuration error. Access tokens are obtained
//! through the [`TokenProvider`] seam: [`ServiceAccountTokenProvider`] runs the OAuth2
//! JWT-bearer flow (optionally impersonating a user through domain-wide delegation), and
//! [`StaticTokenProvider`] serves a pre-obtained token.

use crate::constants::JWT_BEARER_GRANT_TYPE;
use crate::errors::{GapiError, GapiResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime requested for signed assertions.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account JSON key that the token flow needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// The private key must never end up in logs.
impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountCredentials {
    /// Reads and validates a service-account key file.
    pub fn from_file(path: &Path) -> GapiResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GapiError::Configuration(format!(
                "Could not read credentials file '{}': {e}",
                path.display()
            ))
        })?;
        let credentials = Self::from_json(&content)?;
        info!(
            "Loaded service account credentials for {}",
            credentials.client_email
        );
        Ok(credentials)
    }

    /// Parses and validates a service-account key from its JSON text.
    pub fn from_json(json: &str) -> GapiResult<Self> {
        let credentials: Self = serde_json::from_str(json).map_err(|e| {
            GapiError::Configuration(format!("Invalid service account key: {e}"))
        })?;

        if let Some(key_type) = credentials.key_type.as_deref() {
            if key_type != "service_account" {
                return Err(GapiError::Configuration(format!(
                    "Expected a service_account key, got '{key_type}'"
                )));
            }
        }
        if !credentials.private_key.contains("PRIVATE KEY") {
            return Err(GapiError::Configuration(
                "Service account key has no PEM private key".to_string(),
            ));
        }
        Ok(credentials)
    }
}

/// Source of OAuth2 access tokens for API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid bearer token, fetching a new one if needed.
    async fn access_token(&self) -> GapiResult<String>;

    /// Drops any cached token so that the next call fetches a fresh one.
    async fn reset(&self) {}

    /// The identity the tokens act as (the service account email), when known.
    fn identity(&self) -> Option<&str> {
        None
    }
}

/// Serves a fixed token. Useful with tokens obtained elsewhere, and in tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
    identity: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> GapiResult<String> {
        Ok(self.token.clone())
    }

    fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges signed service-account assertions for access tokens, caching each token
/// until shortly before it expires.
pub struct ServiceAccountTokenProvider {
    credentials: ServiceAccountCredentials,
    scopes: Vec<String>,
    subject: Option<String>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Creates a provider for the given scopes.
    ///
    /// When `subject` is set the tokens impersonate that user (domain-wide delegation).
    pub fn new(
        credentials: ServiceAccountCredentials,
        scopes: &[&str],
        subject: Option<&str>,
    ) -> Self {
        Self {
            credentials,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            subject: subject.map(String::from),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> GapiResult<String> {
        let claims = Claims {
            iss: &self.credentials.client_email,
            scope: self.scopes.join(" "),
            aud: &self.credentials.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
            sub: self.subject.as_deref(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.credentials.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| GapiError::Configuration(format!("Invalid private key: {e}")))?;
        encode(&header, &claims, &key)
            .map_err(|e| GapiError::Auth(format!("Could not sign assertion: {e}")))
    }

    async fn fetch_token(&self) -> GapiResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        debug!(
            "Requesting access token for {} (subject: {:?})",
            self.credentials.client_email, self.subject
        );
        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GapiError::Auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GapiError::Auth(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GapiError::Auth(format!("Invalid token response: {e}")))?;

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in - EXPIRY_MARGIN_SECS),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> GapiResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.token.clone());
            }
        }
        let token = self.fetch_token().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn reset(&self) {
        *self.cached.lock().await = None;
    }

    fn identity(&self) -> Option<&str> {
        Some(&self.credentials.client_email)
    }
}

impl fmt::Debug for ServiceAccountTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenProvider")
            .field("client_email", &self.credentials.client_email)
            .field("scopes", &self.scopes)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
