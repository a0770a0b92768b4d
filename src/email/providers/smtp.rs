use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{
        Attachment as MailAttachment, Mailbox, MultiPart, SinglePart, header::ContentType,
    },
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, error};

use crate::email::{
    EmailBody, EmailConfig, EmailError, EmailMessage, EmailProvider, ProviderKind,
};

/// Sends through the SMTP server named in the settings. The password comes
/// from the environment.
pub struct SmtpProvider {
    password: Option<String>,
}

impl SmtpProvider {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }

    fn transport(&self, config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| EmailError::ConfigError("SMTP host is not set".to_string()))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| EmailError::ConfigError("SMTP password is not set".to_string()))?;

        let builder = if config.smtp_secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| EmailError::ConfigError(format!("Failed to create SMTP relay: {}", e)))?;

        Ok(builder
            .port(config.smtp_port)
            .credentials(Credentials::new(config.smtp_user.clone(), password))
            .build())
    }
}

pub(crate) fn build_message(message: &EmailMessage, config: &EmailConfig) -> Result<Message, EmailError> {
    let from = Mailbox::new(
        Some(config.from_name.clone()),
        config
            .from_address
            .parse()
            .map_err(|_| EmailError::InvalidEmail(config.from_address.clone()))?,
    );

    let mut builder = Message::builder().from(from).subject(&message.subject);

    for to in &message.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|_| EmailError::InvalidEmail(to.clone()))?;
        builder = builder.to(mailbox);
    }

    if let Some(reply_to) = message.reply_to.as_ref().or(config.reply_to.as_ref()) {
        let mailbox: Mailbox = reply_to
            .parse()
            .map_err(|_| EmailError::InvalidEmail(reply_to.clone()))?;
        builder = builder.reply_to(mailbox);
    }

    let built = if message.attachments.is_empty() {
        match &message.body {
            EmailBody::Text(text) => builder.singlepart(SinglePart::plain(text.clone())),
            EmailBody::Html(html) => builder.singlepart(SinglePart::html(html.clone())),
            EmailBody::Both { text, html } => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
        }
    } else {
        let mut mixed = match &message.body {
            EmailBody::Text(text) => MultiPart::mixed().singlepart(SinglePart::plain(text.clone())),
            EmailBody::Html(html) => MultiPart::mixed().singlepart(SinglePart::html(html.clone())),
            EmailBody::Both { text, html } => MultiPart::mixed()
                .multipart(MultiPart::alternative_plain_html(text.clone(), html.clone())),
        };

        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                EmailError::ProviderError(format!(
                    "Invalid content type for {}: {}",
                    attachment.filename, e
                ))
            })?;
            mixed = mixed.singlepart(
                MailAttachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }

        builder.multipart(mixed)
    };

    built.map_err(|e| EmailError::ProviderError(format!("Failed to build message: {}", e)))
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Smtp
    }

    fn is_configured(&self, config: &EmailConfig) -> bool {
        config.smtp_host.is_some() && !config.smtp_user.is_empty() && self.password.is_some()
    }

    async fn send_email(
        &self,
        message: &EmailMessage,
        config: &EmailConfig,
    ) -> Result<String, EmailError> {
        debug!("Sending email via SMTP to: {:?}", message.to);

        let transport = self.transport(config)?;
        let email = build_message(message, config)?;

        match transport.send(email).await {
            Ok(response) => {
                let message_id = response
                    .message()
                    .next()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                debug!("Email sent via SMTP. Response: {}", message_id);
                Ok(message_id)
            }
            Err(e) => {
                error!("Failed to send email via SMTP: {}", e);
                Err(EmailError::ProviderError(e.to_string()))
            }
        }
    }

    async fn test_connection(&self, config: &EmailConfig) -> Result<(), EmailError> {
        let transport = self.transport(config)?;
        match transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(EmailError::ProviderError(
                "SMTP server did not accept the connection".to_string(),
            )),
            Err(e) => Err(EmailError::ProviderError(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "SMTP"
    }
}
