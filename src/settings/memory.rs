use super::traits::{SettingsError, SettingsStore, SettingsUpdate};
use super::Settings;
use crate::product::Product;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Settings kept only in memory. Used when no settings file is wanted and as
/// a substitute store in tests.
pub struct MemorySettings {
    known_directories: BTreeMap<Product, Vec<PathBuf>>,
    settings: Mutex<Settings>,
}

impl MemorySettings {
    pub fn new(known_directories: BTreeMap<Product, Vec<PathBuf>>) -> Self {
        Self::with_settings(known_directories, Settings::default())
    }

    pub fn with_settings(known_directories: BTreeMap<Product, Vec<PathBuf>>, settings: Settings) -> Self {
        Self {
            known_directories,
            settings: Mutex::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = self.settings.lock().await;
        settings.reconcile(&self.known_directories);
        Ok(settings.clone())
    }

    async fn update(&self, change: SettingsUpdate) -> Result<Settings, SettingsError> {
        let mut settings = self.settings.lock().await;
        settings.reconcile(&self.known_directories);
        change(&mut settings);
        Ok(settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn test_snapshots_are_independent() {
        let store = MemorySettings::new(BTreeMap::new());

        let mut snapshot = store.load().await.unwrap();
        snapshot.server_address = "http://changed".to_string();

        assert_eq!(store.server_address().await.unwrap(), crate::settings::DEFAULT_SERVER_ADDRESS);
    }

    #[tokio::test]
    async fn test_set_offset_is_monotonic() {
        let store = MemorySettings::new(BTreeMap::new());
        let later = DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z").unwrap();
        let earlier = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z").unwrap();

        assert_eq!(store.set_offset(Product::MdCloud, later).await.unwrap(), later);
        assert_eq!(store.set_offset(Product::MdCloud, earlier).await.unwrap(), later);
    }
}
