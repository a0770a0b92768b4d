use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::settings::EmailSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Smtp,
    Gmail,
    Sendgrid,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Smtp, ProviderKind::Gmail, ProviderKind::Sendgrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Smtp => "smtp",
            ProviderKind::Gmail => "gmail",
            ProviderKind::Sendgrid => "sendgrid",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(ProviderKind::Smtp),
            "gmail" => Ok(ProviderKind::Gmail),
            "sendgrid" => Ok(ProviderKind::Sendgrid),
            other => Err(format!("unknown email provider: {}", other)),
        }
    }
}

/// Resolved email configuration. Secrets (SMTP password, API keys) are not
/// part of it; providers read those from the environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmailConfig {
    pub provider: ProviderKind,
    pub from_name: String,
    pub from_address: String,
    pub reply_to: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_secure: bool,
    pub sendgrid_from_email: Option<String>,
    pub provider_priority: Vec<ProviderKind>,
}

pub const DEFAULT_FROM_NAME: &str = "VyomAi";
pub const DEFAULT_FROM_ADDRESS: &str = "info@vyomai.cloud";
pub const DEFAULT_SMTP_PORT: u16 = 587;

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Smtp,
            from_name: DEFAULT_FROM_NAME.to_string(),
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            reply_to: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: String::new(),
            smtp_secure: false,
            sendgrid_from_email: None,
            provider_priority: ProviderKind::ALL.to_vec(),
        }
    }
}

impl EmailConfig {
    pub fn from_settings(settings: &EmailSettings) -> Self {
        let defaults = Self::default();

        Self {
            provider: settings
                .email_provider
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.provider),
            from_name: non_empty(settings.email_from_name.as_deref()).unwrap_or(defaults.from_name),
            from_address: non_empty(settings.email_from_address.as_deref())
                .unwrap_or(defaults.from_address),
            reply_to: non_empty(settings.email_reply_to.as_deref()),
            smtp_host: non_empty(settings.smtp_host.as_deref()),
            smtp_port: settings.smtp_port.unwrap_or(defaults.smtp_port),
            smtp_user: settings.smtp_user.clone().unwrap_or_default(),
            smtp_secure: settings.smtp_secure.unwrap_or(defaults.smtp_secure),
            sendgrid_from_email: non_empty(settings.sendgrid_from_email.as_deref()),
            provider_priority: parse_provider_priority(
                settings.email_provider_priority.as_deref().unwrap_or_default(),
            ),
        }
    }

    pub fn format_from(&self) -> String {
        format_mailbox(&self.from_name, &self.from_address)
    }

    /// Sender address for SendGrid, which must be a verified sender.
    pub fn sendgrid_sender(&self) -> &str {
        self.sendgrid_from_email
            .as_deref()
            .unwrap_or(&self.from_address)
    }
}

pub fn format_mailbox(name: &str, address: &str) -> String {
    if name.is_empty() {
        address.to_string()
    } else {
        format!("{} <{}>", name, address)
    }
}

/// Parses `"sendgrid, smtp"` into an ordered provider list. Unknown names
/// and repeats are dropped; an empty result falls back to all providers.
pub fn parse_provider_priority(raw: &str) -> Vec<ProviderKind> {
    let mut priority = Vec::new();
    for kind in raw.split(',').filter_map(|p| p.parse::<ProviderKind>().ok()) {
        if !priority.contains(&kind) {
            priority.push(kind);
        }
    }

    if priority.is_empty() {
        ProviderKind::ALL.to_vec()
    } else {
        priority
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
