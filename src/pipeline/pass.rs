use crate::product::Product;
use crate::settings::{SettingsError, SettingsStore};
use crate::source::{DirectoryScanner, ExtractError, LivenessCheck, LogExtractor, LogFileCandidate};
use crate::transport::{Collector, UploadBatch, UploadedLog};
use chrono::{DateTime, FixedOffset, Local};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PassError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("extract error: {0}")]
    Extract(#[from] ExtractError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PassError>;

/// What one pass did for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// No monitor file was written inside the window; nothing changed.
    NoCandidates,
    /// The collector rejected the batch; offset and files are untouched.
    UploadFailed { files: usize, records: usize },
    /// The window was shipped (or had no records) and the offset moved to `now`.
    Uploaded {
        now: DateTime<FixedOffset>,
        files: usize,
        records: usize,
        cleanup: CleanupOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Every monitor file is still owned by a running process.
    NothingToClean,
    /// The termination notice was not acknowledged; files stay for next time.
    NotAcknowledged { files: usize },
    Deleted { deleted: usize, failed: usize },
}

/// Scan, extract, upload, advance the offset, then clean up, for one product.
pub struct UploadPipeline {
    settings: Arc<dyn SettingsStore>,
    collector: Arc<dyn Collector>,
    scanner: DirectoryScanner,
    extractor: LogExtractor,
    liveness: LivenessCheck,
}

impl UploadPipeline {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        collector: Arc<dyn Collector>,
        scanner: DirectoryScanner,
        extractor: LogExtractor,
        liveness: LivenessCheck,
    ) -> Self {
        Self {
            settings,
            collector,
            scanner,
            extractor,
            liveness,
        }
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// One full pass for `product`. Steps run strictly in order; an upload
    /// failure stops the pass before the offset or any file is touched.
    pub async fn run_pass(&self, product: Product) -> Result<PassOutcome> {
        let directories = self.settings.log_directories(product).await?;
        let offset = self.settings.offset(product).await?;
        let now = Local::now().fixed_offset();

        debug!(product = %product, offset = %offset, now = %now, "Starting pass");

        let candidates = {
            let scanner = self.scanner.clone();
            let directories = directories.clone();
            tokio::task::spawn_blocking(move || scanner.scan(&directories, &offset, &now)).await?
        };

        info!(product = %product, files = candidates.len(), "Found log files in window");
        if candidates.is_empty() {
            return Ok(PassOutcome::NoCandidates);
        }

        let batch = {
            let extractor = self.extractor.clone();
            tokio::task::spawn_blocking(move || build_batch(&extractor, product, &candidates, &offset, &now))
                .await??
        };

        let files = batch.logs.len();
        let records = batch.record_count();
        for log in &batch.logs {
            debug!(product = %product, file = %log.filename, records = log.records.len(), "Extracted records");
        }

        if batch.is_empty() {
            debug!(product = %product, "No records in window, skipping upload");
        } else if !self.collector.upload_logs(&batch).await {
            warn!(product = %product, files, records, "Upload failed, offset left unchanged");
            return Ok(PassOutcome::UploadFailed { files, records });
        } else {
            info!(product = %product, files, records, "Uploaded logs");
        }

        let stored = self.settings.set_offset(product, now).await?;
        debug!(product = %product, offset = %stored, "Offset advanced");

        let cleanup = self.cleanup(product, directories, now).await?;

        Ok(PassOutcome::Uploaded {
            now,
            files,
            records,
            cleanup,
        })
    }

    /// Delete finished monitor files once the collector acknowledges them.
    ///
    /// Every monitor file in the directories is considered, not just this
    /// window's, so files left behind by an earlier failed notice are retried.
    /// Files written after `now` are kept: they hold records not yet shipped.
    async fn cleanup(
        &self,
        product: Product,
        directories: Vec<PathBuf>,
        now: DateTime<FixedOffset>,
    ) -> Result<CleanupOutcome> {
        let finished: Vec<LogFileCandidate> = {
            let scanner = self.scanner.clone();
            let liveness = self.liveness.clone();
            tokio::task::spawn_blocking(move || {
                scanner
                    .list_all(&directories)
                    .into_iter()
                    .filter(|candidate| candidate.modified <= now)
                    .filter(|candidate| !liveness.is_live(&candidate.path))
                    .collect()
            })
            .await?
        };

        if finished.is_empty() {
            debug!(product = %product, "No finished log files to clean up");
            return Ok(CleanupOutcome::NothingToClean);
        }

        // The same name can turn up in more than one directory.
        let file_names: Vec<String> = finished
            .iter()
            .map(|c| c.file_name())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !self.collector.notify_files_terminated(&file_names).await {
            warn!(product = %product, files = file_names.len(), "Termination notice not acknowledged, keeping files");
            return Ok(CleanupOutcome::NotAcknowledged {
                files: file_names.len(),
            });
        }

        let mut deleted = 0;
        let mut failed = 0;
        for candidate in &finished {
            match tokio::fs::remove_file(&candidate.path).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(product = %product, path = %candidate.path.display(), "Deleted log file");
                }
                Err(e) => {
                    failed += 1;
                    warn!(product = %product, path = %candidate.path.display(), error = %e, "Failed to delete log file");
                }
            }
        }

        info!(product = %product, deleted, failed, "Cleaned up log files");
        Ok(CleanupOutcome::Deleted { deleted, failed })
    }
}

/// Records of every candidate, grouped by file name. Same-named files from
/// different directories share one entry. Files without records in the window
/// are left out, so the batch can be empty.
fn build_batch(
    extractor: &LogExtractor,
    product: Product,
    candidates: &[LogFileCandidate],
    start: &DateTime<FixedOffset>,
    end: &DateTime<FixedOffset>,
) -> std::result::Result<UploadBatch, ExtractError> {
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for candidate in candidates {
        let records = extractor.extract(&candidate.path, start, end)?;
        if records.is_empty() {
            continue;
        }
        by_name
            .entry(candidate.file_name())
            .or_default()
            .extend(records.into_iter().map(|record| record.text));
    }

    let logs = by_name
        .into_iter()
        .map(|(filename, records)| UploadedLog { filename, records })
        .collect();

    Ok(UploadBatch::new(product, logs))
}
