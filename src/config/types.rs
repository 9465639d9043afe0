use crate::connection::ConnectionTimings;
use crate::product::Product;
use crate::source::scanner::{DEFAULT_FILE_EXTENSION, DEFAULT_FILE_MARKER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the JSON settings document lives. Defaults to the user's local
    /// data directory.
    pub settings_path: Option<PathBuf>,
    pub monitor: MonitorConfig,
    pub connection: ConnectionConfig,
    /// Log directories per product. Products not listed here use the
    /// standard install location.
    pub products: BTreeMap<Product, Vec<PathBuf>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: None,
            monitor: MonitorConfig::default(),
            connection: ConnectionConfig::default(),
            products: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub file_marker: String,
    pub file_extension: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            file_marker: DEFAULT_FILE_MARKER.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub health_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let timings = ConnectionTimings::default();
        Self {
            health_check_interval: timings.health_check_interval,
            retry_interval: timings.retry_interval,
            health_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            settle_delay: timings.settle_delay,
        }
    }
}

impl ConnectionConfig {
    pub fn timings(&self) -> ConnectionTimings {
        ConnectionTimings {
            health_check_interval: self.health_check_interval,
            retry_interval: self.retry_interval,
            settle_delay: self.settle_delay,
        }
    }
}

/// Base under which products install themselves and the agent keeps its
/// settings.
pub fn local_data_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| local_data_dir().join("logbridge").join("settings.json"))
    }

    /// Every product's candidate log directories, whether or not they exist.
    pub fn product_directories(&self) -> BTreeMap<Product, Vec<PathBuf>> {
        self.product_directories_under(&local_data_dir())
    }

    pub fn product_directories_under(&self, base: &Path) -> BTreeMap<Product, Vec<PathBuf>> {
        Product::ALL
            .iter()
            .map(|product| {
                let dirs = self
                    .products
                    .get(product)
                    .cloned()
                    .unwrap_or_else(|| product.default_log_directories(base));
                (*product, dirs)
            })
            .collect()
    }
}
