use crate::settings::{SettingsError, SettingsStore};
use crate::transport::types::{HealthReport, TerminationNotice, UploadBatch, VersionInfo};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const HEALTH_PATH: &str = "/api/v1/monitoring/ready";
pub const UPLOAD_PATH: &str = "/api/v1/monitoring/logs";
pub const TERMINATION_PATH: &str = "/api/v1/monitoring/logs/termination";

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("no server address configured")]
    MissingServerAddress,

    #[error("Collector returned error status {status}: {message}")]
    CollectorError { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, CollectorError>;

/// What the agent needs from the remote collector.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Succeeds iff the collector answered with a 2xx status.
    async fn check_health(&self) -> Result<HealthReport>;

    /// All-or-nothing upload of one product's batch.
    async fn upload_logs(&self, batch: &UploadBatch) -> bool;

    /// Tell the collector these files are finished; `true` means they may be
    /// deleted locally.
    async fn notify_files_terminated(&self, file_names: &[String]) -> bool;
}

/// JSON-over-HTTP collector client.
///
/// The base address is read from the settings store on every request so an
/// address change applies to the next call without rebuilding the client.
pub struct HttpCollector {
    settings: Arc<dyn SettingsStore>,
    client: reqwest::Client,
    health_timeout: Duration,
}

impl HttpCollector {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        request_timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            settings,
            client,
            health_timeout,
        })
    }

    async fn url(&self, path: &str) -> Result<String> {
        let base = self.settings.server_address().await?;
        if base.is_empty() {
            return Err(CollectorError::MissingServerAddress);
        }
        Ok(format!("{}{}", base, path))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            return Err(CollectorError::CollectorError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    async fn try_upload(&self, batch: &UploadBatch) -> Result<()> {
        let url = self.url(UPLOAD_PATH).await?;
        let response = self.client.post(&url).json(batch).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn try_terminate(&self, file_names: &[String]) -> Result<()> {
        let url = self.url(TERMINATION_PATH).await?;
        let body = TerminationNotice {
            file_names: file_names.to_vec(),
        };
        let response = self.client.put(&url).json(&body).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn check_health(&self) -> Result<HealthReport> {
        let url = self.url(HEALTH_PATH).await?;
        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let body = response.text().await?;
        let version = if body.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<VersionInfo>(&body) {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!(error = %e, "Health response carried no version metadata");
                    None
                }
            }
        };

        Ok(HealthReport { version })
    }

    async fn upload_logs(&self, batch: &UploadBatch) -> bool {
        match self.try_upload(batch).await {
            Ok(()) => true,
            Err(e) => {
                error!(product = %batch.product, error = %e, "Failed to upload logs");
                false
            }
        }
    }

    async fn notify_files_terminated(&self, file_names: &[String]) -> bool {
        match self.try_terminate(file_names).await {
            Ok(()) => true,
            Err(e) => {
                error!(files = file_names.len(), error = %e, "Failed to send termination notice");
                false
            }
        }
    }
}
