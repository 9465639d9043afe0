pub mod pass;
pub mod scheduler;

pub use pass::{CleanupOutcome, PassError, PassOutcome, UploadPipeline};
pub use scheduler::{MonitoringScheduler, DEFAULT_MONITOR_INTERVAL};
