use crate::pipeline::pass::{PassOutcome, UploadPipeline};
use crate::product::Product;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// One started run of the monitoring loop.
struct SchedulerRun {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl SchedulerRun {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !*self.done.borrow()
    }
}

async fn wait_done(mut done: watch::Receiver<bool>) {
    // A dropped sender means the loop task is gone, which counts as done.
    let _ = done.wait_for(|finished| *finished).await;
}

/// Runs a pass for every installed product on a fixed interval.
pub struct MonitoringScheduler {
    pipeline: Arc<UploadPipeline>,
    interval: Duration,
    run: Mutex<Option<SchedulerRun>>,
}

impl MonitoringScheduler {
    pub fn new(pipeline: Arc<UploadPipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            run: Mutex::new(None),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .map(SchedulerRun::is_active)
            .unwrap_or(false)
    }

    /// Start the loop. Returns `false` without doing anything if a run is
    /// already active. A previous run that was stopped but has not finished
    /// yet is awaited first, so two loops never overlap.
    pub async fn start(&self) -> bool {
        let mut run = self.run.lock().await;

        if run.as_ref().map(SchedulerRun::is_active).unwrap_or(false) {
            debug!("Monitoring loop already running");
            return false;
        }

        if let Some(previous) = run.take() {
            previous.cancel.cancel();
            wait_done(previous.done).await;
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        tokio::spawn(monitoring_loop(
            Arc::clone(&self.pipeline),
            self.interval,
            cancel.clone(),
            done_tx,
        ));

        *run = Some(SchedulerRun {
            cancel,
            done: done_rx,
        });
        true
    }

    /// Signal the loop to exit. Safe to call repeatedly or with no run.
    pub async fn stop(&self) {
        if let Some(run) = self.run.lock().await.as_ref() {
            if !run.cancel.is_cancelled() {
                info!("Stopping monitoring loop");
            }
            run.cancel.cancel();
        }
    }

    /// Suspend until the current run has exited. Returns at once when no run
    /// was ever started. Once this returns after `stop`, no pass is running
    /// and none will start.
    pub async fn wait_for_completion(&self) {
        let done = self.run.lock().await.as_ref().map(|run| run.done.clone());
        if let Some(done) = done {
            wait_done(done).await;
        }
    }

    /// `stop` followed by `wait_for_completion`.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.wait_for_completion().await;
    }
}

async fn monitoring_loop(
    pipeline: Arc<UploadPipeline>,
    interval: Duration,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, "Monitoring loop started");

    while !cancel.is_cancelled() {
        match pipeline.settings().installed_products().await {
            Ok(products) => {
                if !run_tick(&pipeline, products, &cancel).await {
                    break;
                }
            }
            Err(e) => error!(error = %e, "Failed to read installed products, skipping tick"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Monitoring loop stopped");
    let _ = done.send(true);
}

/// Run every product's pass concurrently and wait for all of them. Returns
/// `false` if cancelled, after every in-flight pass has been aborted and
/// reaped.
async fn run_tick(pipeline: &Arc<UploadPipeline>, products: Vec<Product>, cancel: &CancellationToken) -> bool {
    let mut passes = JoinSet::new();
    for product in products {
        let pipeline = Arc::clone(pipeline);
        passes.spawn(async move { (product, pipeline.run_pass(product).await) });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                passes.shutdown().await;
                return false;
            }
            joined = passes.join_next() => match joined {
                None => return true,
                Some(Ok((product, Ok(outcome)))) => log_outcome(product, &outcome),
                Some(Ok((product, Err(e)))) => {
                    error!(product = %product, error = %e, "Pass failed");
                }
                Some(Err(e)) => error!(error = %e, "Pass task panicked or was cancelled"),
            }
        }
    }
}

fn log_outcome(product: Product, outcome: &PassOutcome) {
    match outcome {
        PassOutcome::NoCandidates => debug!(product = %product, "Nothing to ship"),
        PassOutcome::UploadFailed { .. } => debug!(product = %product, "Pass ended without upload"),
        PassOutcome::Uploaded { records, .. } => debug!(product = %product, records, "Pass complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use crate::source::{DirectoryScanner, LivenessCheck, LogExtractor};
    use crate::transport::{Collector, CollectorError, HealthReport, UploadBatch};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingCollector {
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl Collector for CountingCollector {
        async fn check_health(&self) -> Result<HealthReport, CollectorError> {
            Ok(HealthReport::default())
        }

        async fn upload_logs(&self, _batch: &UploadBatch) -> bool {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn notify_files_terminated(&self, _file_names: &[String]) -> bool {
            false
        }
    }

    fn scheduler(dir: &std::path::Path, collector: Arc<CountingCollector>, interval: Duration) -> MonitoringScheduler {
        let settings = Arc::new(MemorySettings::new(BTreeMap::from([(
            Product::MdCloud,
            vec![dir.to_path_buf()],
        )])));
        let pipeline = UploadPipeline::new(
            settings,
            collector,
            DirectoryScanner::default(),
            LogExtractor::default(),
            LivenessCheck::default(),
        );
        MonitoringScheduler::new(Arc::new(pipeline), interval)
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let tmp = TempDir::new().unwrap();
        let scheduler = scheduler(tmp.path(), Arc::default(), Duration::from_millis(10));

        scheduler.stop().await;
        scheduler.stop().await;
        scheduler.wait_for_completion().await;

        assert!(!scheduler.is_active().await);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let scheduler = scheduler(tmp.path(), Arc::default(), Duration::from_millis(10));

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        assert!(scheduler.is_active().await);

        scheduler.shutdown().await;
        assert!(!scheduler.is_active().await);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let tmp = TempDir::new().unwrap();
        let scheduler = scheduler(tmp.path(), Arc::default(), Duration::from_millis(10));

        scheduler.start().await;
        scheduler.stop().await;
        scheduler.stop().await;

        // Stop must not leave anything behind that blocks a new run.
        assert!(scheduler.start().await);
        assert!(scheduler.is_active().await);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_pass_runs_after_shutdown() {
        let tmp = TempDir::new().unwrap();
        let collector = Arc::new(CountingCollector::default());
        let scheduler = scheduler(tmp.path(), collector.clone(), Duration::from_millis(20));

        scheduler.start().await;
        scheduler.shutdown().await;
        let after_shutdown = collector.uploads.load(Ordering::SeqCst);

        let line = format!("[{}] late line", chrono::Local::now().to_rfc3339());
        let mut file = std::fs::File::create(tmp.path().join("late_monitor.log")).unwrap();
        writeln!(file, "{}", line).unwrap();
        drop(file);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(collector.uploads.load(Ordering::SeqCst), after_shutdown);
    }

    struct PanickingCollector;

    #[async_trait]
    impl Collector for PanickingCollector {
        async fn check_health(&self) -> Result<HealthReport, CollectorError> {
            Ok(HealthReport::default())
        }

        async fn upload_logs(&self, _batch: &UploadBatch) -> bool {
            panic!("collector blew up");
        }

        async fn notify_files_terminated(&self, _file_names: &[String]) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_panicking_pass_does_not_stop_loop() {
        let tmp = TempDir::new().unwrap();
        let line = format!(
            "[{}] boom",
            (chrono::Local::now() - chrono::Duration::seconds(1)).to_rfc3339()
        );
        let mut file = std::fs::File::create(tmp.path().join("x_monitor.log")).unwrap();
        writeln!(file, "{}", line).unwrap();
        drop(file);

        let settings = Arc::new(MemorySettings::new(BTreeMap::from([(
            Product::MdDrone,
            vec![tmp.path().to_path_buf()],
        )])));
        let pipeline = UploadPipeline::new(
            settings,
            Arc::new(PanickingCollector),
            DirectoryScanner::default(),
            LogExtractor::default(),
            LivenessCheck::default(),
        );
        let scheduler = MonitoringScheduler::new(Arc::new(pipeline), Duration::from_millis(10));

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.is_active().await);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_running_loop_ships_new_lines() {
        let tmp = TempDir::new().unwrap();
        let collector = Arc::new(CountingCollector::default());
        let scheduler = scheduler(tmp.path(), collector.clone(), Duration::from_millis(20));

        let line = format!(
            "[{}] hello",
            (chrono::Local::now() - chrono::Duration::seconds(1)).to_rfc3339()
        );
        let mut file = std::fs::File::create(tmp.path().join("cloud_monitor.log")).unwrap();
        writeln!(file, "{}", line).unwrap();
        drop(file);

        scheduler.start().await;
        for _ in 0..100 {
            if collector.uploads.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.shutdown().await;

        assert_eq!(collector.uploads.load(Ordering::SeqCst), 1);
    }
}
