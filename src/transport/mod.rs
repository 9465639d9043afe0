pub mod client;
pub mod types;

pub use client::{Collector, CollectorError, HttpCollector};
pub use types::{HealthReport, TerminationNotice, UploadBatch, UploadedLog, VersionInfo};
