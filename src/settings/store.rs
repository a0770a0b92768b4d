use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{SettingsError, SiteSettings};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<SiteSettings, SettingsError>;
    async fn save(&self, settings: &SiteSettings) -> Result<(), SettingsError>;
}

pub type DynSettingsStore = Arc<dyn SettingsStore>;

/// Settings kept in a TOML file. A missing file reads as defaults.
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<SiteSettings, SettingsError> {
        if !fs::try_exists(&self.path).await? {
            debug!("Settings file {:?} not found, using defaults", self.path);
            return Ok(SiteSettings::default());
        }

        let contents = fs::read_to_string(&self.path).await?;
        let doc = contents
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| SettingsError::ParseError(e.to_string()))?;

        toml_edit::de::from_document(doc).map_err(|e| SettingsError::ParseError(e.to_string()))
    }

    async fn save(&self, settings: &SiteSettings) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;

        let doc = toml_edit::ser::to_document(settings)
            .map_err(|e| SettingsError::SerializeError(e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling file first so readers never see a half-written document
        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, doc.to_string()).await?;
        fs::rename(&tmp_path, &self.path).await?;

        info!("Settings saved to {:?}", self.path);
        Ok(())
    }
}

/// In-process settings, counting reads. Can be switched into a failing mode.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RwLock<SiteSettings>,
    reads: AtomicUsize,
    failing: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new(settings: SiteSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            reads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<SiteSettings, SettingsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettingsError::Unavailable("store marked as failing".into()));
        }
        Ok(self.settings.read().await.clone())
    }

    async fn save(&self, settings: &SiteSettings) -> Result<(), SettingsError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettingsError::Unavailable("store marked as failing".into()));
        }
        *self.settings.write().await = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ContentSection;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.toml"));

        let settings = store.load().await.unwrap();
        assert_eq!(settings, SiteSettings::default());
        assert_eq!(settings.pricing.base_currency, "USD");
    }

    #[tokio::test]
    async fn test_file_store_persists_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("settings.toml");
        let store = FileSettingsStore::new(&path);

        let mut settings = SiteSettings::default();
        settings.email.email_provider = Some("sendgrid".to_string());
        settings.email.smtp_port = Some(465);
        settings.email.email_provider_priority = Some("sendgrid,smtp".to_string());
        settings.pricing.exchange_rates.insert("INR".to_string(), 83.0);
        settings.sections.insert(
            "hero".to_string(),
            ContentSection {
                title: "Build with AI".to_string(),
                subtitle: None,
                body: "We ship models.".to_string(),
                visible: true,
            },
        );

        store.save(&settings).await.unwrap();
        assert!(path.exists());

        let loaded = FileSettingsStore::new(&path).load().await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "[email\nbroken = ").await.unwrap();

        let result = FileSettingsStore::new(&path).load().await;
        assert!(matches!(result, Err(SettingsError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_memory_store_counts_reads_and_fails_on_demand() {
        let store = MemorySettingsStore::default();
        store.load().await.unwrap();
        store.load().await.unwrap();
        assert_eq!(store.read_count(), 2);

        store.set_failing(true);
        assert!(store.load().await.is_err());
        assert_eq!(store.read_count(), 3);
    }
}
