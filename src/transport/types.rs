use crate::product::Product;
use serde::{Deserialize, Serialize};

/// One file's worth of records inside an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedLog {
    pub filename: String,
    pub records: Vec<String>,
}

/// Body of `POST /api/v1/monitoring/logs`. Built once per pass and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub product: Product,
    pub logs: Vec<UploadedLog>,
}

impl UploadBatch {
    pub fn new(product: Product, logs: Vec<UploadedLog>) -> Self {
        Self { product, logs }
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.logs.iter().map(|log| log.records.len()).sum()
    }
}

/// Body of `PUT /api/v1/monitoring/logs/termination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationNotice {
    pub file_names: Vec<String>,
}

/// Version metadata the collector may attach to a health response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub latest_version: Option<String>,
}

/// Outcome of a successful health check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub version: Option<VersionInfo>,
}
