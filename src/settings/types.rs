use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the admin dashboard can edit, persisted as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub admin: AdminAccount,
    #[serde(default)]
    pub sections: BTreeMap<String, ContentSection>,
    #[serde(default)]
    pub pricing: PricingSettings,
}

/// Raw email settings as stored. `email_provider_priority` is a
/// comma-separated list such as `"smtp,gmail,sendgrid"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_from_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sendgrid_from_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_provider_priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// One block of the landing page (hero, about, services, pricing, team,
/// media, contact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Exchange rates are expressed as units of the currency per one unit of
/// `base_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub exchange_rates: BTreeMap<String, f64>,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            exchange_rates: BTreeMap::new(),
        }
    }
}

pub const SECTION_NAMES: [&str; 7] = [
    "hero", "about", "services", "pricing", "team", "media", "contact",
];

pub fn is_known_section(name: &str) -> bool {
    SECTION_NAMES.contains(&name)
}
