use crate::email::{DynEmailProvider, EmailConfig};
use crate::settings::{FileSettingsStore, SettingsError, SettingsStore};
use crate::{Config, Environment};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Settings file cannot be read: {0}")]
    SettingsUnreadable(#[from] SettingsError),

    #[error("Settings directory does not exist: {0}")]
    SettingsDirectoryMissing(String),

    #[error("No email provider is configured; contact and booking emails will fail")]
    NoEmailProviderConfigured,

    #[error("The default app secret must be changed in production")]
    DefaultSecretInProduction,
}

impl StartupCheckError {
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::SettingsUnreadable(_) | StartupCheckError::DefaultSecretInProduction
        )
    }
}

const DEFAULT_SECRET: &str = "change-me-in-production";

pub async fn perform_startup_checks(
    config: &Config,
    providers: &[DynEmailProvider],
) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Settings document
    let settings_path = &config.settings.path;
    if let Some(parent) = settings_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        warn!("Settings directory does not exist: {:?}", parent);
        errors.push(StartupCheckError::SettingsDirectoryMissing(
            parent.display().to_string(),
        ));
    }

    let email_config = match FileSettingsStore::new(settings_path).load().await {
        Ok(settings) => {
            info!("Settings file is readable: {:?}", settings_path);
            EmailConfig::from_settings(&settings.email)
        }
        Err(e) => {
            error!("Settings file {:?} cannot be read: {}", settings_path, e);
            errors.push(StartupCheckError::SettingsUnreadable(e));
            EmailConfig::default()
        }
    };

    // Email providers
    let configured: Vec<_> = providers
        .iter()
        .filter(|p| p.is_configured(&email_config))
        .map(|p| p.kind())
        .collect();
    if configured.is_empty() {
        warn!("No email provider has credentials configured");
        errors.push(StartupCheckError::NoEmailProviderConfigured);
    } else {
        info!(
            "Configured email providers: {:?} (primary: {})",
            configured, email_config.provider
        );
        if !configured.contains(&email_config.provider) {
            warn!(
                "Primary email provider {} is not configured, fallback providers will be used",
                email_config.provider
            );
        }
    }

    if config.app.environment == Environment::Production && config.app.secret == DEFAULT_SECRET {
        error!("app.secret is still the default value");
        errors.push(StartupCheckError::DefaultSecretInProduction);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::ProviderKind;
    use crate::email::providers::mock::MockProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.settings.path = dir.path().join("settings.toml");
        config
    }

    fn providers(configured: bool) -> Vec<DynEmailProvider> {
        let provider = if configured {
            MockProvider::new(ProviderKind::Smtp)
        } else {
            MockProvider::unconfigured(ProviderKind::Smtp)
        };
        vec![Arc::new(provider) as DynEmailProvider]
    }

    #[tokio::test]
    async fn test_missing_settings_file_passes() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        assert!(perform_startup_checks(&config, &providers(true)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unparseable_settings_is_critical() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.settings.path, "this is [not toml").unwrap();

        let errors = perform_startup_checks(&config, &providers(true))
            .await
            .unwrap_err();
        assert!(errors.iter().any(|e| e.is_critical()));
    }

    #[tokio::test]
    async fn test_no_configured_provider_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let errors = perform_startup_checks(&config, &providers(false))
            .await
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StartupCheckError::NoEmailProviderConfigured));
        assert!(!errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_default_secret_rejected_in_production() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.app.environment = Environment::Production;

        let errors = perform_startup_checks(&config, &providers(true))
            .await
            .unwrap_err();
        assert!(matches!(errors[0], StartupCheckError::DefaultSecretInProduction));
    }
}
