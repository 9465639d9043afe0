use super::traits::{SettingsError, SettingsStore, SettingsUpdate};
use super::Settings;
use crate::product::Product;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Settings persisted as a pretty-printed JSON document.
pub struct JsonFileSettings {
    path: PathBuf,
    known_directories: BTreeMap<Product, Vec<PathBuf>>,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    /// `known_directories` lists where each product logs when installed.
    pub fn new(path: impl Into<PathBuf>, known_directories: BTreeMap<Product, Vec<PathBuf>>) -> Self {
        Self {
            path: path.into(),
            known_directories,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Settings {
        let mut settings = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => match serde_json::from_str::<Settings>(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "Failed to parse settings, using defaults");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file yet, using defaults");
                Settings::default()
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read settings, using defaults");
                Settings::default()
            }
        };

        settings.reconcile(&self.known_directories);
        settings
    }

    async fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_error = |source: std::io::Error| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }

        let json = serde_json::to_string_pretty(settings)?;

        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_error)?;

        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn load(&self) -> Result<Settings, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await)
    }

    async fn update(&self, change: SettingsUpdate) -> Result<Settings, SettingsError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read().await;
        change(&mut settings);
        self.write(&settings).await?;
        Ok(settings)
    }
}
