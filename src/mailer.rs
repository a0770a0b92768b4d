use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::Environment;
use crate::assistant::{ReplyKind, ReplyRequest, ReplyWriter};
use crate::email::{
    Attachment, EmailConfig, EmailConfigService, EmailDispatcher, EmailError, EmailMessage,
    EmailResult, EmailTemplates, FailureKind, ProviderKind, ProviderStatus, classify_failure,
    escape_html, templates, text_to_html_paragraphs,
};
use crate::reset::ResetCodeStore;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("The email address {0} could not receive mail")]
    InvalidRecipient(String),

    #[error("Email delivery failed: {0}")]
    DeliveryFailed(String),

    #[error(transparent)]
    Email(#[from] EmailError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub service: String,
    #[serde(default)]
    pub preferred_date: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub plan: String,
    #[serde(default)]
    pub message: Option<String>,
}

fn esc(value: &str) -> String {
    escape_html(value.trim())
}

fn esc_opt(value: &Option<String>) -> String {
    value.as_deref().map(esc).unwrap_or_default()
}

fn paragraphs_opt(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(text_to_html_paragraphs)
        .unwrap_or_default()
}

/// The use-case senders. Company notifications are best effort; failures
/// of the message to the submitter are returned to the caller.
pub struct Mailer {
    config: Arc<EmailConfigService>,
    dispatcher: Arc<EmailDispatcher>,
    replies: ReplyWriter,
    templates: EmailTemplates,
    reset_codes: Arc<ResetCodeStore>,
    environment: Environment,
}

impl Mailer {
    pub fn new(
        config: Arc<EmailConfigService>,
        dispatcher: Arc<EmailDispatcher>,
        replies: ReplyWriter,
        reset_codes: Arc<ResetCodeStore>,
        environment: Environment,
    ) -> Result<Self, EmailError> {
        Ok(Self {
            config,
            dispatcher,
            replies,
            templates: EmailTemplates::new()?,
            reset_codes,
            environment,
        })
    }

    pub fn config_service(&self) -> &Arc<EmailConfigService> {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<EmailDispatcher> {
        &self.dispatcher
    }

    pub fn reset_codes(&self) -> &Arc<ResetCodeStore> {
        &self.reset_codes
    }

    pub async fn send_email_with_result(&self, message: &EmailMessage) -> EmailResult {
        let config = self.config.get_config().await;
        self.dispatcher.send(message, &config).await
    }

    pub async fn send_email(&self, message: &EmailMessage) -> bool {
        self.send_email_with_result(message).await.success
    }

    /// Connectivity check for `provider`, or for the configured primary.
    pub async fn test_email_provider(&self, provider: Option<ProviderKind>) -> EmailResult {
        let config = self.config.get_config().await;
        let kind = provider.unwrap_or(config.provider);
        let status = self.dispatcher.test_provider(kind, &config).await;

        EmailResult {
            success: status.available,
            provider: kind,
            error: status.error,
            message_id: None,
        }
    }

    pub async fn provider_statuses(&self) -> BTreeMap<ProviderKind, ProviderStatus> {
        let config = self.config.get_config().await;
        self.dispatcher.provider_statuses(&config).await
    }

    async fn notify_company(&self, config: &EmailConfig, message: EmailMessage) {
        let result = self.dispatcher.send(&message, config).await;
        if !result.success {
            error!(
                notification_failed = true,
                subject = %message.subject,
                provider = %result.provider,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Company notification could not be delivered"
            );
        }
    }

    async fn deliver_to_submitter(
        &self,
        config: &EmailConfig,
        message: EmailMessage,
    ) -> Result<(), NotifyError> {
        let result = self.dispatcher.send(&message, config).await;
        if result.success {
            return Ok(());
        }

        let raw_error = result.error.unwrap_or_else(|| "unknown error".to_string());
        let recipient = message.to.join(", ");
        match classify_failure(&raw_error) {
            FailureKind::InvalidRecipient => {
                warn!(to = %recipient, error = %raw_error, "Recipient address rejected");
                Err(NotifyError::InvalidRecipient(recipient))
            }
            FailureKind::Transport => Err(NotifyError::DeliveryFailed(raw_error)),
        }
    }

    pub async fn send_contact_form(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        let config = self.config.get_config().await;
        let message_html = text_to_html_paragraphs(&submission.message);

        let notification = self.templates.render(
            templates::CONTACT_NOTIFICATION,
            &liquid::object!({
                "name": esc(&submission.name),
                "email": esc(&submission.email),
                "phone": esc_opt(&submission.phone),
                "company": esc_opt(&submission.company),
                "subject": esc(&submission.subject),
                "message": message_html.clone(),
            }),
        )?;
        self.notify_company(
            &config,
            EmailMessage::new(
                config.from_address.clone(),
                format!("New contact form submission: {}", submission.subject.trim()),
            )
            .with_html(notification)
            .with_reply_to(submission.email.trim()),
        )
        .await;

        let reply = self
            .replies
            .generate_reply(&ReplyRequest {
                kind: ReplyKind::Inquiry,
                name: submission.name.trim(),
                message: Some(&submission.message),
                context: Some(&submission.subject),
            })
            .await
            .unwrap_or_default();

        let confirmation = self.templates.render(
            templates::CONTACT_CONFIRMATION,
            &liquid::object!({
                "company_name": esc(&config.from_name),
                "name": esc(&submission.name),
                "subject": esc(&submission.subject),
                "message": message_html,
                "reply": reply,
            }),
        )?;

        self.deliver_to_submitter(
            &config,
            EmailMessage::new(
                submission.email.trim(),
                format!("Thank you for contacting {}", config.from_name),
            )
            .with_html(confirmation),
        )
        .await?;

        info!("Contact form from {} processed", submission.email.trim());
        Ok(())
    }

    pub async fn send_booking_confirmation(&self, booking: &BookingRequest) -> Result<(), NotifyError> {
        let config = self.config.get_config().await;
        let message_html = paragraphs_opt(&booking.message);

        let notification = self.templates.render(
            templates::BOOKING_NOTIFICATION,
            &liquid::object!({
                "name": esc(&booking.name),
                "email": esc(&booking.email),
                "phone": esc_opt(&booking.phone),
                "company": esc_opt(&booking.company),
                "service": esc(&booking.service),
                "preferred_date": esc_opt(&booking.preferred_date),
                "message": message_html.clone(),
            }),
        )?;
        self.notify_company(
            &config,
            EmailMessage::new(
                config.from_address.clone(),
                format!("New booking request: {}", booking.service.trim()),
            )
            .with_html(notification)
            .with_reply_to(booking.email.trim()),
        )
        .await;

        let mut context = format!("Service: {}", booking.service.trim());
        if let Some(date) = &booking.preferred_date {
            context.push_str(&format!("; preferred date: {}", date.trim()));
        }
        let reply = self
            .replies
            .generate_reply(&ReplyRequest {
                kind: ReplyKind::Booking,
                name: booking.name.trim(),
                message: booking.message.as_deref(),
                context: Some(&context),
            })
            .await
            .unwrap_or_default();

        let confirmation = self.templates.render(
            templates::BOOKING_CONFIRMATION,
            &liquid::object!({
                "company_name": esc(&config.from_name),
                "name": esc(&booking.name),
                "service": esc(&booking.service),
                "preferred_date": esc_opt(&booking.preferred_date),
                "message": message_html,
                "reply": reply,
            }),
        )?;

        self.deliver_to_submitter(
            &config,
            EmailMessage::new(
                booking.email.trim(),
                format!("Your booking request with {}", config.from_name),
            )
            .with_html(confirmation),
        )
        .await?;

        info!("Booking from {} processed", booking.email.trim());
        Ok(())
    }

    pub async fn send_pricing_request(&self, request: &PricingRequest) -> Result<(), NotifyError> {
        let config = self.config.get_config().await;
        let message_html = paragraphs_opt(&request.message);

        let notification = self.templates.render(
            templates::PRICING_NOTIFICATION,
            &liquid::object!({
                "name": esc(&request.name),
                "email": esc(&request.email),
                "company": esc_opt(&request.company),
                "plan": esc(&request.plan),
                "message": message_html.clone(),
            }),
        )?;
        self.notify_company(
            &config,
            EmailMessage::new(
                config.from_address.clone(),
                format!("New pricing request: {}", request.plan.trim()),
            )
            .with_html(notification)
            .with_reply_to(request.email.trim()),
        )
        .await;

        let confirmation = self.templates.render(
            templates::PRICING_CONFIRMATION,
            &liquid::object!({
                "company_name": esc(&config.from_name),
                "name": esc(&request.name),
                "plan": esc(&request.plan),
                "message": message_html,
            }),
        )?;

        self.deliver_to_submitter(
            &config,
            EmailMessage::new(
                request.email.trim(),
                format!("Your {} pricing request", request.plan.trim()),
            )
            .with_html(confirmation),
        )
        .await
    }

    /// Issues a reset code for `email` and mails it. Outside production the
    /// code is also logged.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), NotifyError> {
        let config = self.config.get_config().await;
        let code = self.reset_codes.issue(email).await;
        let minutes = self.reset_codes.ttl().num_minutes();

        if self.environment != Environment::Production {
            info!(email = %email.trim(), code = %code, "Password reset code (not logged in production)");
        }

        let html = self.templates.render(
            templates::PASSWORD_RESET,
            &liquid::object!({
                "company_name": esc(&config.from_name),
                "code": code.clone(),
                "minutes": minutes,
            }),
        )?;
        let text = format!(
            "Your {} password reset code is {}. It expires in {} minutes.",
            config.from_name, code, minutes
        );

        self.deliver_to_submitter(
            &config,
            EmailMessage::new(email.trim(), format!("{} password reset code", config.from_name))
                .with_both(text, html),
        )
        .await
    }

    pub async fn send_with_attachment(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachment: Attachment,
    ) -> bool {
        let config = self.config.get_config().await;
        let message = EmailMessage::new(to.trim(), subject)
            .with_html(html)
            .with_attachment(attachment);
        self.dispatcher.send_with_attachment(&message, &config).await
    }
}
