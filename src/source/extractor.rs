use crate::source::timestamp::{is_between, TimestampExtractor};
use chrono::{DateTime, FixedOffset};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One log line inside the upload window, with its timestamp token removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub text: String,
}

/// Pulls time-windowed records out of monitor log files.
#[derive(Debug, Clone)]
pub struct LogExtractor {
    timestamps: TimestampExtractor,
}

impl Default for LogExtractor {
    fn default() -> Self {
        Self::new(TimestampExtractor::bracketed())
    }
}

impl LogExtractor {
    pub fn new(timestamps: TimestampExtractor) -> Self {
        Self { timestamps }
    }

    /// Read `path` and return every record whose timestamp `t` satisfies
    /// `start < t <= end`, in file order.
    ///
    /// The file is only ever opened for reading, so writers appending to it
    /// are not disturbed. A missing file yields no records. Lines without a
    /// parseable timestamp are skipped; a read error ends the scan and the
    /// records gathered so far are returned.
    pub fn extract(
        &self,
        path: &Path,
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Result<Vec<LogRecord>, ExtractError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Log file disappeared before extraction");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ExtractError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut buf = Vec::new();
        let mut line_number = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = line_number + 1,
                        error = %e,
                        "Read error, keeping records extracted so far"
                    );
                    break;
                }
            }
            line_number += 1;

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            match self.timestamps.extract(line) {
                Ok(Some(stamped)) if is_between(&stamped.timestamp, start, end) => {
                    records.push(LogRecord {
                        timestamp: stamped.timestamp,
                        text: stamped.message,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        line = line_number,
                        error = %e,
                        "Dropping line with malformed timestamp"
                    );
                }
            }
        }

        Ok(records)
    }
}
