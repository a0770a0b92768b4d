//! Gmail API provider.
//!
//! Access tokens come from a connector: either a fixed `GMAIL_ACCESS_TOKEN`,
//! or an HTTP endpoint (`GMAIL_CONNECTOR_URL`, authenticated with
//! `GMAIL_CONNECTOR_TOKEN`) that answers `{"access_token": "..."}`. Messages
//! are sent as raw RFC 5322 documents, base64url encoded.

use async_trait::async_trait;
use base64::{
    Engine,
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::email::{
    EmailBody, EmailConfig, EmailError, EmailMessage, EmailProvider, ProviderKind, env_var,
};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Clone, PartialEq)]
pub enum GmailConnector {
    AccessToken(String),
    Endpoint { url: String, token: String },
}

impl GmailConnector {
    pub fn from_env() -> Option<Self> {
        if let Some(token) = env_var("GMAIL_ACCESS_TOKEN") {
            return Some(GmailConnector::AccessToken(token));
        }
        match (env_var("GMAIL_CONNECTOR_URL"), env_var("GMAIL_CONNECTOR_TOKEN")) {
            (Some(url), Some(token)) => Some(GmailConnector::Endpoint { url, token }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConnectorResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

pub struct GmailProvider {
    connector: Option<GmailConnector>,
    api_url: String,
    client: Client,
}

impl GmailProvider {
    pub fn new(connector: Option<GmailConnector>) -> Self {
        Self {
            connector,
            api_url: GMAIL_API_URL.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn access_token(&self) -> Result<String, EmailError> {
        match &self.connector {
            None => Err(EmailError::ConfigError(
                "Gmail connector is not configured".to_string(),
            )),
            Some(GmailConnector::AccessToken(token)) => Ok(token.clone()),
            Some(GmailConnector::Endpoint { url, token }) => {
                let response = self.client.get(url).bearer_auth(token).send().await?;
                if !response.status().is_success() {
                    return Err(EmailError::ConfigError(format!(
                        "Gmail connector returned {}",
                        response.status()
                    )));
                }
                let body: ConnectorResponse = response.json().await?;
                Ok(body.access_token)
            }
        }
    }
}

#[async_trait]
impl EmailProvider for GmailProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gmail
    }

    fn is_configured(&self, _config: &EmailConfig) -> bool {
        self.connector.is_some()
    }

    async fn send_email(
        &self,
        message: &EmailMessage,
        config: &EmailConfig,
    ) -> Result<String, EmailError> {
        let token = self.access_token().await?;
        let boundary = format!("vyomai-{:016x}", rand::random::<u64>());
        let mime = build_mime(message, config, &boundary);

        debug!(to = ?message.to, subject = %message.subject, "Sending email via Gmail API");

        let response = self
            .client
            .post(format!("{}/messages/send", self.api_url))
            .bearer_auth(token)
            .json(&SendRequest {
                raw: URL_SAFE.encode(mime),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let sent: SendResponse = response.json().await?;
            debug!(message_id = %sent.id, "Email sent via Gmail API");
            return Ok(sent.id);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "Gmail API error");
        Err(EmailError::ProviderError(format!(
            "Gmail error ({}): {}",
            status, error_body
        )))
    }

    async fn test_connection(&self, _config: &EmailConfig) -> Result<(), EmailError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/profile", self.api_url))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EmailError::ProviderError(format!(
                "Gmail profile check failed ({})",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "Gmail"
    }
}

/// Renders the message as a MIME document. With attachments the body is
/// wrapped in `multipart/mixed`; text plus HTML become `multipart/alternative`.
pub fn build_mime(message: &EmailMessage, config: &EmailConfig, boundary: &str) -> String {
    let mut out = String::new();
    push_header(&mut out, "From", &format_address(&config.from_name, &config.from_address));
    push_header(&mut out, "To", &message.to.join(", "));
    if let Some(reply_to) = message.reply_to.as_ref().or(config.reply_to.as_ref()) {
        push_header(&mut out, "Reply-To", reply_to);
    }
    push_header(&mut out, "Subject", &encode_header_value(&message.subject));
    push_header(&mut out, "MIME-Version", "1.0");

    if message.attachments.is_empty() {
        out.push_str(&body_entity(&message.body, boundary));
        return out;
    }

    let mixed = format!("mixed-{}", boundary);
    push_header(
        &mut out,
        "Content-Type",
        &format!("multipart/mixed; boundary=\"{}\"", mixed),
    );
    out.push_str("\r\n");

    out.push_str(&format!("--{}\r\n", mixed));
    out.push_str(&body_entity(&message.body, boundary));

    for attachment in &message.attachments {
        let filename = attachment.filename.replace('"', "");
        out.push_str(&format!("\r\n--{}\r\n", mixed));
        push_header(
            &mut out,
            "Content-Type",
            &format!("{}; name=\"{}\"", attachment.content_type, filename),
        );
        push_header(
            &mut out,
            "Content-Disposition",
            &format!("attachment; filename=\"{}\"", filename),
        );
        push_header(&mut out, "Content-Transfer-Encoding", "base64");
        out.push_str("\r\n");
        out.push_str(&wrap_base64(&attachment.data));
    }
    out.push_str(&format!("\r\n--{}--\r\n", mixed));
    out
}

fn body_entity(body: &EmailBody, boundary: &str) -> String {
    match body {
        EmailBody::Text(text) => leaf_part("text/plain", text),
        EmailBody::Html(html) => leaf_part("text/html", html),
        EmailBody::Both { text, html } => {
            let alt = format!("alt-{}", boundary);
            let mut out = String::new();
            push_header(
                &mut out,
                "Content-Type",
                &format!("multipart/alternative; boundary=\"{}\"", alt),
            );
            out.push_str("\r\n");
            out.push_str(&format!("--{}\r\n", alt));
            out.push_str(&leaf_part("text/plain", text));
            out.push_str(&format!("\r\n--{}\r\n", alt));
            out.push_str(&leaf_part("text/html", html));
            out.push_str(&format!("\r\n--{}--\r\n", alt));
            out
        }
    }
}

fn leaf_part(content_type: &str, content: &str) -> String {
    let mut out = String::new();
    push_header(
        &mut out,
        "Content-Type",
        &format!("{}; charset=\"UTF-8\"", content_type),
    );
    push_header(&mut out, "Content-Transfer-Encoding", "base64");
    out.push_str("\r\n");
    out.push_str(&wrap_base64(content.as_bytes()));
    out
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    // Header injection guard
    out.push_str(&value.replace(['\r', '\n'], " "));
    out.push_str("\r\n");
}

fn format_address(name: &str, address: &str) -> String {
    if name.is_empty() {
        address.to_string()
    } else {
        format!("{} <{}>", encode_header_value(name), address)
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", BASE64.encode(value))
    }
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = BASE64.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 76 * 2 + 2);
    for chunk in encoded.as_bytes().chunks(76) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}
