pub mod json;
pub mod memory;
pub mod traits;

use crate::product::Product;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use json::JsonFileSettings;
pub use memory::MemorySettings;
pub use traits::{SettingsError, SettingsStore};

pub const DEFAULT_SERVER_ADDRESS: &str = "http://172.16.3.82:8080";
pub const DEFAULT_LOCALE: &str = "en-US";

/// Watermark every product starts from.
pub fn epoch_offset() -> DateTime<FixedOffset> {
    DateTime::<Utc>::default().fixed_offset()
}

/// Full settings snapshot, handed out by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub server_address: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub product_log_directories: BTreeMap<Product, Vec<PathBuf>>,
    #[serde(default)]
    pub product_offsets: BTreeMap<Product, DateTime<FixedOffset>>,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            locale: default_locale(),
            product_log_directories: BTreeMap::new(),
            product_offsets: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Rebuild the directory table from the known install locations, keeping
    /// only directories that exist. Products left without a directory are not
    /// installed. Installed products always get an offset; stored offsets of
    /// uninstalled products are kept so a reinstall resumes where it stopped.
    pub fn reconcile(&mut self, known_directories: &BTreeMap<Product, Vec<PathBuf>>) {
        self.product_log_directories = known_directories
            .iter()
            .filter_map(|(product, dirs)| {
                let existing: Vec<PathBuf> = dirs.iter().filter(|d| d.is_dir()).cloned().collect();
                (!existing.is_empty()).then_some((*product, existing))
            })
            .collect();

        for product in self.product_log_directories.keys() {
            self.product_offsets
                .entry(*product)
                .or_insert_with(epoch_offset);
        }
    }

    pub fn installed_products(&self) -> Vec<Product> {
        self.product_log_directories.keys().copied().collect()
    }

    pub fn offset(&self, product: Product) -> DateTime<FixedOffset> {
        self.product_offsets
            .get(&product)
            .copied()
            .unwrap_or_else(epoch_offset)
    }

    /// Move the offset forward. Earlier timestamps are ignored so the
    /// watermark never regresses. Returns the stored value.
    pub fn advance_offset(
        &mut self,
        product: Product,
        offset: DateTime<FixedOffset>,
    ) -> DateTime<FixedOffset> {
        let entry = self.product_offsets.entry(product).or_insert_with(epoch_offset);
        if offset > *entry {
            *entry = offset;
        }
        *entry
    }
}

/// Normalise a user supplied server address: keep an explicit `http://` or
/// `https://` scheme, default to `http://`, and drop trailing slashes.
pub fn normalize_server_address(address: &str) -> String {
    let address = address.trim();
    if address.is_empty() {
        return String::new();
    }

    let with_scheme = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    with_scheme.trim_end_matches('/').to_string()
}
