use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use crate::email::{EmailConfig, EmailError, EmailMessage, EmailProvider, ProviderKind};

/// Provider that records what it is asked to send instead of sending it.
/// Used by the unit and integration tests.
pub struct MockProvider {
    kind: ProviderKind,
    configured: bool,
    failure: Option<String>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            configured: true,
            failure: None,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every send fails with `message`.
    pub fn failing(kind: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(kind)
        }
    }

    /// A provider that reports missing credentials.
    pub fn unconfigured(kind: ProviderKind) -> Self {
        Self {
            configured: false,
            ..Self::new(kind)
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|m| m.to.iter().any(|to| to.eq_ignore_ascii_case(address)))
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self, _config: &EmailConfig) -> bool {
        self.configured
    }

    async fn send_email(
        &self,
        message: &EmailMessage,
        _config: &EmailConfig,
    ) -> Result<String, EmailError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(failure) = &self.failure {
            return Err(EmailError::ProviderError(failure.clone()));
        }

        info!(
            provider = %self.kind,
            to = ?message.to,
            subject = %message.subject,
            "MOCK EMAIL PROVIDER - recorded email"
        );
        self.sent.lock().await.push(message.clone());
        Ok(format!("mock-{}-{}", self.kind, attempt))
    }

    async fn test_connection(&self, _config: &EmailConfig) -> Result<(), EmailError> {
        match &self.failure {
            Some(failure) => Err(EmailError::ProviderError(failure.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "Mock Email Provider (Recording Only)"
    }
}
