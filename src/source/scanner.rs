use crate::source::timestamp::is_between;
use chrono::{DateTime, FixedOffset, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_FILE_MARKER: &str = "_monitor";
pub const DEFAULT_FILE_EXTENSION: &str = "log";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A monitor log file together with its last write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileCandidate {
    pub path: PathBuf,
    pub modified: DateTime<FixedOffset>,
}

impl LogFileCandidate {
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists monitor log files in a set of directories.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    marker: String,
    extension: String,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_MARKER, DEFAULT_FILE_EXTENSION)
    }
}

impl DirectoryScanner {
    pub fn new(marker: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            extension: extension.into(),
        }
    }

    /// Whether a file name follows the monitor log naming convention.
    pub fn is_monitor_log(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);

        has_extension && file_name_of(path).contains(&self.marker)
    }

    /// Monitor log files last written inside `(start, end]`.
    pub fn scan(
        &self,
        directories: &[PathBuf],
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Vec<LogFileCandidate> {
        self.list_all(directories)
            .into_iter()
            .filter(|candidate| is_between(&candidate.modified, start, end))
            .collect()
    }

    /// Every monitor log file in the directories, regardless of write time.
    ///
    /// Directories that do not exist or cannot be listed contribute nothing.
    pub fn list_all(&self, directories: &[PathBuf]) -> Vec<LogFileCandidate> {
        let mut candidates = Vec::new();

        for directory in directories {
            match self.list_directory(directory) {
                Ok(found) => candidates.extend(found),
                Err(e) => warn!(error = %e, "Skipping log directory this cycle"),
            }
        }

        candidates
    }

    fn list_directory(&self, directory: &Path) -> Result<Vec<LogFileCandidate>, ScanError> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(directory = %directory.display(), "Log directory does not exist");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ScanError::ReadDir {
                    path: directory.to_path_buf(),
                    source,
                })
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(directory = %directory.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if !self.is_monitor_log(&path) {
                continue;
            }

            let modified = match entry.metadata().and_then(|meta| {
                if meta.is_file() {
                    meta.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping file without metadata");
                    continue;
                }
            };

            found.push(LogFileCandidate {
                path,
                modified: DateTime::<Utc>::from(modified).fixed_offset(),
            });
        }

        Ok(found)
    }
}
