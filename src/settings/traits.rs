use super::{normalize_server_address, Settings};
use crate::product::Product;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SettingsUpdate = Box<dyn FnOnce(&mut Settings) + Send>;

/// Access path for persisted agent settings.
///
/// Implementations serialise calls: each `update` is one complete
/// read-modify-write, and no two run at the same time.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current snapshot, reconciled against the installed products.
    async fn load(&self) -> Result<Settings, SettingsError>;

    /// Apply `change` to a fresh snapshot and persist it.
    async fn update(&self, change: SettingsUpdate) -> Result<Settings, SettingsError>;

    async fn installed_products(&self) -> Result<Vec<Product>, SettingsError> {
        Ok(self.load().await?.installed_products())
    }

    async fn log_directories(&self, product: Product) -> Result<Vec<PathBuf>, SettingsError> {
        Ok(self
            .load()
            .await?
            .product_log_directories
            .remove(&product)
            .unwrap_or_default())
    }

    async fn offset(&self, product: Product) -> Result<DateTime<FixedOffset>, SettingsError> {
        Ok(self.load().await?.offset(product))
    }

    /// Store a new offset; returns the value actually kept, which is never
    /// earlier than the previous one.
    async fn set_offset(
        &self,
        product: Product,
        offset: DateTime<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>, SettingsError> {
        let settings = self
            .update(Box::new(move |settings| {
                settings.advance_offset(product, offset);
            }))
            .await?;
        Ok(settings.offset(product))
    }

    async fn server_address(&self) -> Result<String, SettingsError> {
        Ok(self.load().await?.server_address)
    }

    /// Normalise and store the server address; returns the stored form.
    async fn set_server_address(&self, address: &str) -> Result<String, SettingsError> {
        let address = normalize_server_address(address);
        let settings = self
            .update(Box::new(move |settings| {
                settings.server_address = address;
            }))
            .await?;
        Ok(settings.server_address)
    }

    async fn locale(&self) -> Result<String, SettingsError> {
        Ok(self.load().await?.locale)
    }

    async fn set_locale(&self, locale: &str) -> Result<(), SettingsError> {
        let locale = locale.to_string();
        self.update(Box::new(move |settings| {
            settings.locale = locale;
        }))
        .await?;
        Ok(())
    }
}
