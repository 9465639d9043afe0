use crate::connection::state::{ConnectionState, StatusView, UpdateAvailability};
use crate::pipeline::MonitoringScheduler;
use crate::settings::{SettingsError, SettingsStore};
use crate::transport::{Collector, VersionInfo};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DOWNLOAD_PATH: &str = "/api/v1/files/download";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimings {
    pub health_check_interval: Duration,
    pub retry_interval: Duration,
    /// Pause between a healthy check and starting the scheduler.
    pub settle_delay: Duration,
}

impl Default for ConnectionTimings {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(5),
            retry_interval: Duration::from_secs(5),
            settle_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Failed,
    /// Another attempt was already running; nothing was done.
    AlreadyConnecting,
}

/// Owns the connection state and decides when the scheduler runs.
pub struct ConnectionManager {
    settings: Arc<dyn SettingsStore>,
    collector: Arc<dyn Collector>,
    scheduler: Arc<MonitoringScheduler>,
    timings: ConnectionTimings,
    state: watch::Sender<ConnectionState>,
    has_connected: AtomicBool,
    /// Bumped every time a connection is established.
    session: AtomicU64,
    window_visible: AtomicBool,
    latest_version: Mutex<Option<VersionInfo>>,
}

/// Resets a `Connecting` state left behind by an attempt that was dropped
/// before it finished.
struct AttemptGuard<'a> {
    state: &'a watch::Sender<ConnectionState>,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_if_modified(|state| {
                if *state == ConnectionState::Connecting {
                    *state = ConnectionState::Idle;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl ConnectionManager {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        collector: Arc<dyn Collector>,
        scheduler: Arc<MonitoringScheduler>,
        timings: ConnectionTimings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            settings,
            collector,
            scheduler,
            timings,
            state,
            has_connected: AtomicBool::new(false),
            session: AtomicU64::new(0),
            window_visible: AtomicBool::new(false),
            latest_version: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn scheduler(&self) -> &Arc<MonitoringScheduler> {
        &self.scheduler
    }

    pub fn set_window_visible(&self, visible: bool) {
        self.window_visible.store(visible, Ordering::SeqCst);
    }

    pub fn latest_version(&self) -> Option<VersionInfo> {
        self.latest_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_availability(&self) -> UpdateAvailability {
        UpdateAvailability::evaluate(self.latest_version().as_ref(), self.state())
    }

    pub fn status(&self) -> StatusView {
        StatusView::new(self.state(), self.update_availability())
    }

    /// Where the advertised build can be fetched, if the collector announced one.
    pub async fn download_url(&self) -> Result<Option<String>, SettingsError> {
        let Some(file_id) = self.latest_version().and_then(|info| info.file_id) else {
            return Ok(None);
        };
        let base = self.settings.server_address().await?;
        Ok(Some(format!("{}{}/{}", base, DOWNLOAD_PATH, file_id)))
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, update = ?self.update_availability(), "Connection state changed");
        }
    }

    /// Keep the last advertised build unless the collector names a new one.
    fn record_version(&self, version: Option<VersionInfo>) {
        if let Some(info) = version.filter(|info| info.latest_version.is_some()) {
            *self.latest_version.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);
        }
    }

    /// Health-check the collector and start the scheduler on success.
    pub async fn connect(&self) -> ConnectOutcome {
        let began = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                false
            } else {
                *state = ConnectionState::Connecting;
                true
            }
        });
        if !began {
            debug!("Connection attempt already in progress");
            return ConnectOutcome::AlreadyConnecting;
        }
        info!("Connecting to collector");

        let mut guard = AttemptGuard {
            state: &self.state,
            armed: true,
        };

        self.scheduler.shutdown().await;

        let outcome = match self.collector.check_health().await {
            Ok(report) => {
                self.record_version(report.version);
                tokio::time::sleep(self.timings.settle_delay).await;
                self.scheduler.start().await;
                self.has_connected.store(true, Ordering::SeqCst);
                self.session.fetch_add(1, Ordering::SeqCst);
                self.transition(ConnectionState::Connected);
                ConnectOutcome::Connected
            }
            Err(e) => {
                let next = if self.has_connected.load(Ordering::SeqCst) {
                    ConnectionState::Error
                } else {
                    ConnectionState::InitError
                };
                warn!(error = %e, state = %next, "Collector health check failed");
                self.transition(next);
                ConnectOutcome::Failed
            }
        };

        guard.armed = false;
        outcome
    }

    /// Return to `Idle` from `Connected` or `Error`, stopping the scheduler.
    /// Returns `false` when the state allowed no disconnect.
    pub async fn disconnect(&self) -> bool {
        let mut previous = ConnectionState::Idle;
        let left = self.state.send_if_modified(|state| {
            previous = *state;
            if matches!(*state, ConnectionState::Connected | ConnectionState::Error) {
                *state = ConnectionState::Idle;
                true
            } else {
                false
            }
        });
        if !left {
            return false;
        }

        info!(from = %previous, to = %ConnectionState::Idle, "Connection state changed");
        self.scheduler.shutdown().await;
        true
    }

    /// Store a new server address, then toggle: a live or failed connection
    /// is dropped to `Idle`, anything else starts an attempt.
    pub async fn submit_server_address(&self, address: &str) -> Result<ConnectionState, SettingsError> {
        let stored = self.settings.set_server_address(address).await?;
        info!(address = %stored, "Server address updated");

        match self.state() {
            ConnectionState::Connected | ConnectionState::Error => {
                self.disconnect().await;
            }
            _ => {
                self.connect().await;
            }
        }
        Ok(self.state())
    }

    /// One periodic health check. Only acts while `Connected`; a failure moves
    /// to `Error` once and stops the scheduler. A failure that outlives the
    /// connection it was checking is ignored.
    pub async fn check_connected_health(&self) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        let session = self.session.load(Ordering::SeqCst);

        match self.collector.check_health().await {
            Ok(report) => self.record_version(report.version),
            Err(e) => {
                let lost = self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connected && self.session.load(Ordering::SeqCst) == session {
                        *state = ConnectionState::Error;
                        true
                    } else {
                        false
                    }
                });
                if lost {
                    warn!(error = %e, "Lost connection to collector");
                    self.scheduler.shutdown().await;
                }
            }
        }
    }

    /// One retry tick. Reconnects from an error state unless a window is
    /// showing the status to a user.
    pub async fn retry_if_disconnected(&self) {
        if self.window_visible.load(Ordering::SeqCst) || !self.state().is_error() {
            return;
        }
        debug!("Retrying connection");
        self.connect().await;
    }

    /// Spawn the health-check and retry loops. Both exit when `cancel` fires.
    pub fn spawn_background_tasks(self: &Arc<Self>, cancel: CancellationToken) -> BackgroundTasks {
        let health = tokio::spawn(periodic(
            "health check",
            self.timings.health_check_interval,
            cancel.clone(),
            {
                let manager = Arc::clone(self);
                move || {
                    let manager = Arc::clone(&manager);
                    async move { manager.check_connected_health().await }
                }
            },
        ));

        let retry = tokio::spawn(periodic("retry", self.timings.retry_interval, cancel, {
            let manager = Arc::clone(self);
            move || {
                let manager = Arc::clone(&manager);
                async move { manager.retry_if_disconnected().await }
            }
        }));

        BackgroundTasks { health, retry }
    }
}

async fn periodic<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut body: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = body() => {}
        }
    }
    debug!(task = name, "Background loop stopped");
}

/// Handles of the loops started by `spawn_background_tasks`.
pub struct BackgroundTasks {
    health: JoinHandle<()>,
    retry: JoinHandle<()>,
}

impl BackgroundTasks {
    pub async fn join(self) {
        for (name, handle) in [("health check", self.health), ("retry", self.retry)] {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "Background task failed");
            }
        }
    }
}
