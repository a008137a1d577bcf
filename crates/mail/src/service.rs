use crate::message::{Attachment, MailMessage};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use gapi_helper::constants::MAIL_SCOPES;
use gapi_helper::{
    Access, ApiClient, GapiConfig, GapiError, GapiResult, MailConfig, ServiceAccountCredentials,
    TokenProvider, NO_QUERY,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Deserialize)]
struct SentMessage {
    id: Option<String>,
}

/// Gmail client sending as `sender` (through domain-wide delegation).
#[derive(Debug, Clone)]
pub struct MailService {
    client: ApiClient,
    sender: String,
    settings: MailConfig,
    api_url: String,
}

impl MailService {
    pub fn new(config: &GapiConfig, credentials: &ServiceAccountCredentials, sender: &str) -> Self {
        let client =
            ApiClient::service_account(
                credentials,
                MAIL_SCOPES,
                Some(sender),
                config.retry.clone(),
            );
        Self::with_client(config, client, sender)
    }

    pub fn with_token_provider(
        config: &GapiConfig,
        tokens: Arc<dyn TokenProvider>,
        sender: &str,
    ) -> Self {
        Self::with_client(config, ApiClient::new(tokens, config.retry.clone()), sender)
    }

    fn with_client(config: &GapiConfig, client: ApiClient, sender: &str) -> Self {
        Self {
            client,
            sender: sender.to_string(),
            settings: config.mail.clone(),
            api_url: config.endpoints.gmail_api.clone(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Drops the cached access token.
    pub async fn reset(&self) {
        self.client.reset().await;
    }

    /// Builds a message from this sender.
    ///
    /// When `force_test_email` is configured the recipient is replaced by the test address
    /// and CC recipients are dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        reply_to: Option<&str>,
        cc: &[&str],
        attachment: Option<&Path>,
        attachment_type: Option<&str>,
    ) -> GapiResult<MailMessage> {
        let forced = self.settings.force_test_email;
        let to = if forced {
            self.settings.to_test.clone().ok_or_else(|| {
                GapiError::Configuration(
                    "force_test_email is set but no test recipient is configured".to_string(),
                )
            })?
        } else {
            to.to_string()
        };
        let cc = if forced {
            Vec::new()
        } else {
            cc.iter().map(|s| s.to_string()).collect()
        };
        let attachment = attachment
            .map(|path| Attachment::from_path(path, attachment_type))
            .transpose()?;

        let message = MailMessage {
            to,
            from: self.sender.clone(),
            reply_to: reply_to.map(String::from),
            cc,
            subject: subject.to_string(),
            body: body.to_string(),
            attachment,
        };
        message.check_headers()?;
        Ok(message)
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.api_url, self.sender)
    }

    /// Sends a message and returns its Gmail ID.
    pub async fn send_message(&self, message: &MailMessage) -> GapiResult<String> {
        message.check_headers()?;
        let boundary = format!("=_{}", uuid::Uuid::new_v4().simple());
        let raw = URL_SAFE.encode(message.to_bytes(&boundary));
        let url = format!("{}/send", self.messages_url());

        info!("Sending email '{}' to {}", message.subject, message.to);
        let sent: SentMessage = self
            .client
            .send_json(Access::Write, Method::POST, &url, NO_QUERY, &json!({"raw": raw}))
            .await?;
        sent.id.ok_or_else(|| {
            warn!("Gmail accepted the message without returning an id");
            GapiError::RemoteWrite {
                status: None,
                message: format!("Could not send email to {}: {}", message.to, message.subject),
            }
        })
    }

    /// Moves a message of this sender's mailbox to the trash.
    pub async fn trash_message(&self, id: &str) -> GapiResult<()> {
        let url = format!("{}/{}/trash", self.messages_url(), id);
        self.client
            .send(Access::Write, |http| http.post(&url))
            .await?;
        Ok(())
    }

    /// Sends a message, then moves it to the trash.
    pub async fn send_and_trash_message(&self, message: &MailMessage) -> GapiResult<String> {
        let id = self.send_message(message).await?;
        self.trash_message(&id).await?;
        Ok(id)
    }
}
