//! SendGrid v3 HTTP API provider.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::email::{EmailConfig, EmailError, EmailMessage, EmailProvider, ProviderKind};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

pub struct SendGridProvider {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl SendGridProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: SENDGRID_API_URL.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&str, EmailError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| EmailError::ConfigError("SendGrid API key is not set".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress>,
    subject: String,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String,
    filename: String,
    #[serde(rename = "type")]
    content_type: String,
    disposition: String,
}

fn build_request(message: &EmailMessage, config: &EmailConfig) -> SendGridRequest {
    // SendGrid wants text/plain before text/html
    let mut content = Vec::new();
    if let Some(text) = message.body.text() {
        content.push(Content {
            content_type: "text/plain".to_string(),
            value: text.to_string(),
        });
    }
    if let Some(html) = message.body.html() {
        content.push(Content {
            content_type: "text/html".to_string(),
            value: html.to_string(),
        });
    }

    SendGridRequest {
        personalizations: vec![Personalization {
            to: message
                .to
                .iter()
                .map(|email| EmailAddress {
                    email: email.clone(),
                    name: None,
                })
                .collect(),
        }],
        from: EmailAddress {
            email: config.sendgrid_sender().to_string(),
            name: Some(config.from_name.clone()),
        },
        reply_to: message
            .reply_to
            .as_ref()
            .or(config.reply_to.as_ref())
            .map(|r| EmailAddress {
                email: r.clone(),
                name: None,
            }),
        subject: message.subject.clone(),
        content,
        attachments: message
            .attachments
            .iter()
            .map(|a| SendGridAttachment {
                content: BASE64.encode(&a.data),
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
                disposition: "attachment".to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sendgrid
    }

    fn is_configured(&self, _config: &EmailConfig) -> bool {
        self.api_key.is_some()
    }

    async fn send_email(
        &self,
        message: &EmailMessage,
        config: &EmailConfig,
    ) -> Result<String, EmailError> {
        let api_key = self.api_key()?;
        let request = build_request(message, config);

        debug!(to = ?message.to, subject = %message.subject, "Sending email via SendGrid");

        let response = self
            .client
            .post(format!("{}/mail/send", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            // SendGrid returns the message id in a header, with an empty body
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            debug!(message_id = %message_id, "Email sent via SendGrid");
            return Ok(message_id);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "SendGrid API error");

        Err(EmailError::ProviderError(match status.as_u16() {
            429 => "SendGrid rate limit exceeded".to_string(),
            401 | 403 => "SendGrid authentication failed".to_string(),
            _ => format!("SendGrid error ({}): {}", status, error_body),
        }))
    }

    async fn test_connection(&self, _config: &EmailConfig) -> Result<(), EmailError> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/scopes", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EmailError::ProviderError(format!(
                "SendGrid API key check failed ({})",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "SendGrid"
    }
}
