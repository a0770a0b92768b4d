use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use super::{
    DynEmailProvider, EmailConfig, EmailMessage, EmailResult, ProviderKind, ProviderStatus,
};

/// Tries the configured provider, then the fallback priority list.
pub struct EmailDispatcher {
    providers: Vec<DynEmailProvider>,
}

impl EmailDispatcher {
    pub fn new(providers: Vec<DynEmailProvider>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[DynEmailProvider] {
        &self.providers
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&DynEmailProvider> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    fn ready_provider(&self, kind: ProviderKind, config: &EmailConfig) -> Option<&DynEmailProvider> {
        self.provider(kind).filter(|p| p.is_configured(config))
    }

    async fn attempt(
        &self,
        provider: &DynEmailProvider,
        message: &EmailMessage,
        config: &EmailConfig,
    ) -> EmailResult {
        match provider.send_email(message, config).await {
            Ok(message_id) => {
                info!(
                    provider = %provider.kind(),
                    backend = provider.name(),
                    to = ?message.to,
                    message_id = %message_id,
                    "Email sent"
                );
                EmailResult::sent(provider.kind(), message_id)
            }
            Err(e) => {
                warn!(
                    provider = %provider.kind(),
                    backend = provider.name(),
                    error = %e,
                    "Email provider failed"
                );
                EmailResult::failed(provider.kind(), e.to_string())
            }
        }
    }

    /// Delivers `message`. Never raises for provider failures: the last
    /// failure is returned once every candidate has been tried.
    pub async fn send(&self, message: &EmailMessage, config: &EmailConfig) -> EmailResult {
        if message.to.is_empty() {
            return EmailResult::failed(config.provider, "message has no recipients");
        }

        let mut last = match self.ready_provider(config.provider, config) {
            Some(provider) => {
                let result = self.attempt(provider, message, config).await;
                if result.success {
                    return result;
                }
                result
            }
            None => {
                warn!(provider = %config.provider, "Primary email provider is not configured");
                EmailResult::failed(
                    config.provider,
                    format!("{} provider is not configured", config.provider),
                )
            }
        };

        for kind in &config.provider_priority {
            if *kind == config.provider {
                continue;
            }
            let Some(provider) = self.ready_provider(*kind, config) else {
                debug!(provider = %kind, "Skipping unconfigured fallback provider");
                continue;
            };

            info!(provider = %kind, "Falling back to next email provider");
            let result = self.attempt(provider, message, config).await;
            if result.success {
                return result;
            }
            last = result;
        }

        error!(
            provider = %last.provider,
            error = last.error.as_deref().unwrap_or("unknown"),
            "All email providers failed"
        );
        last
    }

    /// Connectivity check for one provider. Sends nothing.
    pub async fn test_provider(&self, kind: ProviderKind, config: &EmailConfig) -> ProviderStatus {
        let Some(provider) = self.provider(kind) else {
            return ProviderStatus::unavailable(format!("{} provider is not registered", kind));
        };
        if !provider.is_configured(config) {
            return ProviderStatus::unavailable(format!("{} credentials are missing", kind));
        }

        match provider.test_connection(config).await {
            Ok(()) => ProviderStatus::available(),
            Err(e) => ProviderStatus::unavailable(e.to_string()),
        }
    }

    pub async fn provider_statuses(
        &self,
        config: &EmailConfig,
    ) -> BTreeMap<ProviderKind, ProviderStatus> {
        let mut statuses = BTreeMap::new();
        for kind in ProviderKind::ALL {
            statuses.insert(kind, self.test_provider(kind, config).await);
        }
        statuses
    }

    /// Attachment delivery goes through SMTP when it is configured and the
    /// Gmail connector otherwise; there is no further fallback.
    pub async fn send_with_attachment(&self, message: &EmailMessage, config: &EmailConfig) -> bool {
        let provider = self
            .ready_provider(ProviderKind::Smtp, config)
            .or_else(|| self.ready_provider(ProviderKind::Gmail, config));

        let Some(provider) = provider else {
            error!("No provider available for attachment delivery (need SMTP or Gmail)");
            return false;
        };

        self.attempt(provider, message, config).await.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::providers::mock::MockProvider;
    use crate::email::Attachment;
    use std::sync::Arc;

    fn dispatcher_with(providers: &[Arc<MockProvider>]) -> EmailDispatcher {
        EmailDispatcher::new(
            providers
                .iter()
                .map(|p| p.clone() as DynEmailProvider)
                .collect(),
        )
    }

    fn message() -> EmailMessage {
        EmailMessage::new("ada@example.com", "Hi").with_text("Hello")
    }

    fn config(primary: ProviderKind) -> EmailConfig {
        EmailConfig {
            provider: primary,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let smtp = Arc::new(MockProvider::new(ProviderKind::Smtp));
        let gmail = Arc::new(MockProvider::new(ProviderKind::Gmail));
        let sendgrid = Arc::new(MockProvider::new(ProviderKind::Sendgrid));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone(), sendgrid.clone()]);

        let result = dispatcher.send(&message(), &config(ProviderKind::Smtp)).await;

        assert!(result.success);
        assert_eq!(result.provider, ProviderKind::Smtp);
        assert_eq!(smtp.attempt_count(), 1);
        assert_eq!(gmail.attempt_count(), 0);
        assert_eq!(sendgrid.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_tries_each_provider_once_and_returns_last_error() {
        let smtp = Arc::new(MockProvider::failing(ProviderKind::Smtp, "smtp down"));
        let gmail = Arc::new(MockProvider::failing(ProviderKind::Gmail, "gmail down"));
        let sendgrid = Arc::new(MockProvider::failing(ProviderKind::Sendgrid, "sendgrid down"));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone(), sendgrid.clone()]);

        // Primary also listed in the priority list must not be tried twice
        let result = dispatcher.send(&message(), &config(ProviderKind::Gmail)).await;

        assert!(!result.success);
        assert_eq!(result.provider, ProviderKind::Sendgrid);
        assert!(result.error.unwrap().contains("sendgrid down"));
        assert_eq!(gmail.attempt_count(), 1);
        assert_eq!(smtp.attempt_count(), 1);
        assert_eq!(sendgrid.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_follows_priority_order() {
        let smtp = Arc::new(MockProvider::failing(ProviderKind::Smtp, "smtp down"));
        let gmail = Arc::new(MockProvider::new(ProviderKind::Gmail));
        let sendgrid = Arc::new(MockProvider::new(ProviderKind::Sendgrid));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone(), sendgrid.clone()]);

        let mut cfg = config(ProviderKind::Smtp);
        cfg.provider_priority = vec![ProviderKind::Sendgrid, ProviderKind::Gmail];

        let result = dispatcher.send(&message(), &cfg).await;

        assert!(result.success);
        assert_eq!(result.provider, ProviderKind::Sendgrid);
        assert_eq!(gmail.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_are_skipped() {
        let smtp = Arc::new(MockProvider::unconfigured(ProviderKind::Smtp));
        let gmail = Arc::new(MockProvider::unconfigured(ProviderKind::Gmail));
        let sendgrid = Arc::new(MockProvider::new(ProviderKind::Sendgrid));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone(), sendgrid.clone()]);

        let result = dispatcher.send(&message(), &config(ProviderKind::Smtp)).await;

        assert!(result.success);
        assert_eq!(result.provider, ProviderKind::Sendgrid);
        assert_eq!(smtp.attempt_count(), 0);
        assert_eq!(gmail.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_configured_reports_primary() {
        let dispatcher = dispatcher_with(&[Arc::new(MockProvider::unconfigured(
            ProviderKind::Smtp,
        ))]);

        let result = dispatcher.send(&message(), &config(ProviderKind::Smtp)).await;

        assert!(!result.success);
        assert_eq!(result.provider, ProviderKind::Smtp);
        assert_eq!(result.error.as_deref(), Some("smtp provider is not configured"));
    }

    #[tokio::test]
    async fn test_message_without_recipients_is_rejected() {
        let smtp = Arc::new(MockProvider::new(ProviderKind::Smtp));
        let dispatcher = dispatcher_with(&[smtp.clone()]);
        let mut msg = message();
        msg.to.clear();

        let result = dispatcher.send(&msg, &config(ProviderKind::Smtp)).await;

        assert!(!result.success);
        assert_eq!(smtp.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_statuses_do_not_send() {
        let smtp = Arc::new(MockProvider::new(ProviderKind::Smtp));
        let gmail = Arc::new(MockProvider::failing(ProviderKind::Gmail, "token expired"));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone()]);

        let statuses = dispatcher.provider_statuses(&EmailConfig::default()).await;

        assert!(statuses[&ProviderKind::Smtp].available);
        assert_eq!(
            statuses[&ProviderKind::Gmail].error.as_deref(),
            Some("Email provider error: token expired")
        );
        assert!(!statuses[&ProviderKind::Sendgrid].available);
        assert_eq!(smtp.attempt_count(), 0);
        assert!(smtp.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_attachment_prefers_smtp_then_gmail() {
        let smtp = Arc::new(MockProvider::unconfigured(ProviderKind::Smtp));
        let gmail = Arc::new(MockProvider::new(ProviderKind::Gmail));
        let sendgrid = Arc::new(MockProvider::new(ProviderKind::Sendgrid));
        let dispatcher = dispatcher_with(&[smtp.clone(), gmail.clone(), sendgrid.clone()]);

        let msg = message().with_attachment(Attachment::new("quote.pdf", vec![1, 2, 3]));
        assert!(dispatcher.send_with_attachment(&msg, &EmailConfig::default()).await);
        assert_eq!(gmail.attempt_count(), 1);
        assert_eq!(sendgrid.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_attachment_without_smtp_or_gmail_fails() {
        let sendgrid = Arc::new(MockProvider::new(ProviderKind::Sendgrid));
        let dispatcher = dispatcher_with(&[sendgrid.clone()]);

        let msg = message().with_attachment(Attachment::new("quote.pdf", vec![1]));
        assert!(!dispatcher.send_with_attachment(&msg, &EmailConfig::default()).await);
        assert_eq!(sendgrid.attempt_count(), 0);
    }
}
