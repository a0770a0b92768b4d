pub mod config;
pub mod dispatcher;
pub mod error;
pub mod escape;
pub mod providers;
pub mod resolver;
pub mod templates;
pub mod types;

pub use config::*;
pub use dispatcher::EmailDispatcher;
pub use error::*;
pub use escape::{escape_html, text_to_html_paragraphs};
pub use resolver::EmailConfigService;
pub use templates::EmailTemplates;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use providers::{
    gmail::{GmailConnector, GmailProvider},
    sendgrid::SendGridProvider,
    smtp::SmtpProvider,
};

/// One delivery backend. Configuration is passed per call because it is
/// edited at runtime through the admin settings.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the credentials this provider needs are present.
    fn is_configured(&self, config: &EmailConfig) -> bool;

    /// Delivers the message, returning the provider's message id.
    async fn send_email(
        &self,
        message: &EmailMessage,
        config: &EmailConfig,
    ) -> Result<String, EmailError>;

    /// Checks connectivity and credentials without sending anything.
    async fn test_connection(&self, config: &EmailConfig) -> Result<(), EmailError>;

    fn name(&self) -> &str;
}

pub type DynEmailProvider = Arc<dyn EmailProvider>;

/// Credentials that never live in the settings document.
#[derive(Debug, Clone, Default)]
pub struct EmailSecrets {
    pub smtp_password: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub gmail: Option<GmailConnector>,
}

impl EmailSecrets {
    pub fn from_env() -> Self {
        Self {
            smtp_password: env_var("SMTP_PASSWORD"),
            sendgrid_api_key: env_var("SENDGRID_API_KEY"),
            gmail: GmailConnector::from_env(),
        }
    }
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds the three real providers in their default order.
pub fn create_providers(secrets: &EmailSecrets) -> Vec<DynEmailProvider> {
    info!(
        smtp_password = secrets.smtp_password.is_some(),
        sendgrid_api_key = secrets.sendgrid_api_key.is_some(),
        gmail_connector = secrets.gmail.is_some(),
        "Creating email providers"
    );

    vec![
        Arc::new(SmtpProvider::new(secrets.smtp_password.clone())),
        Arc::new(GmailProvider::new(secrets.gmail.clone())),
        Arc::new(SendGridProvider::new(secrets.sendgrid_api_key.clone())),
    ]
}
