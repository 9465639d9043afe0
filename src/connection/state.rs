use crate::transport::VersionInfo;
use serde::Serialize;
use std::fmt;

/// Version of the running agent, compared against the collector's
/// `latestVersion`.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Error,
    /// The very first connection attempt failed.
    InitError,
}

impl ConnectionState {
    pub fn is_error(self) -> bool {
        matches!(self, ConnectionState::Error | ConnectionState::InitError)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::InitError => "init_error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateAvailability {
    UpToDate,
    ReadyToUpdate,
    /// A newer build exists but cannot be fetched while disconnected.
    Blocked,
}

impl UpdateAvailability {
    pub fn evaluate(version: Option<&VersionInfo>, state: ConnectionState) -> Self {
        if !update_exists(version, AGENT_VERSION) {
            UpdateAvailability::UpToDate
        } else if state == ConnectionState::Connected {
            UpdateAvailability::ReadyToUpdate
        } else {
            UpdateAvailability::Blocked
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrayIndicator {
    Waiting,
    Normal,
    Connected,
    ConnectError,
}

/// Everything a front end needs to render the agent's status. Built fresh
/// from the state; it holds nothing of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub state: ConnectionState,
    pub detail: &'static str,
    pub server_status: &'static str,
    pub tray: TrayIndicator,
    pub tray_tooltip: &'static str,
    pub update: UpdateAvailability,
}

impl StatusView {
    pub fn new(state: ConnectionState, update: UpdateAvailability) -> Self {
        let (detail, server_status, tray, tray_tooltip) = match state {
            ConnectionState::Idle => (
                "Enter the server address and connect.",
                "Waiting",
                TrayIndicator::Waiting,
                "Waiting for connection",
            ),
            ConnectionState::Connecting => (
                "Connecting to the server...",
                "Connecting",
                TrayIndicator::Normal,
                "Connecting",
            ),
            ConnectionState::Connected => (
                "Logs are being sent to the server.",
                "Connected",
                TrayIndicator::Connected,
                "Connected",
            ),
            ConnectionState::Error => (
                "Lost connection to the server. Retrying...",
                "Failed",
                TrayIndicator::ConnectError,
                "Connection failed",
            ),
            ConnectionState::InitError => (
                "Could not reach the server. Check the address.",
                "Failed",
                TrayIndicator::ConnectError,
                "Connection failed",
            ),
        };

        Self {
            state,
            detail,
            server_status,
            tray,
            tray_tooltip,
            update,
        }
    }
}

/// Dotted numeric version with two to four components.
fn parse_version(text: &str) -> Option<Vec<u64>> {
    let parts = text
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (2..=4).contains(&parts.len()).then_some(parts)
}

/// True when the collector advertises a downloadable build newer than
/// `current`. A missing component sorts below zero, so `1.2 < 1.2.0`.
pub fn update_exists(version: Option<&VersionInfo>, current: &str) -> bool {
    let Some(info) = version else {
        return false;
    };
    let (Some(latest), Some(_)) = (info.latest_version.as_deref(), info.file_id.as_deref()) else {
        return false;
    };

    match (parse_version(latest), parse_version(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(latest: Option<&str>, file_id: Option<&str>) -> VersionInfo {
        VersionInfo {
            file_id: file_id.map(str::to_string),
            latest_version: latest.map(str::to_string),
        }
    }

    #[test]
    fn test_update_exists_needs_both_fields() {
        assert!(update_exists(Some(&info(Some("9.0.0"), Some("abc"))), "1.0.0"));
        assert!(!update_exists(Some(&info(Some("9.0.0"), None)), "1.0.0"));
        assert!(!update_exists(Some(&info(None, Some("abc"))), "1.0.0"));
        assert!(!update_exists(None, "1.0.0"));
    }

    #[test]
    fn test_version_ordering() {
        let check = |latest: &str, current: &str| update_exists(Some(&info(Some(latest), Some("f"))), current);

        assert!(check("1.10.0", "1.9.9"));
        assert!(check("1.2.0", "1.2"));
        assert!(!check("1.2.0", "1.2.0"));
        assert!(!check("1.1.9", "1.2.0"));
    }

    #[test]
    fn test_malformed_versions_mean_up_to_date() {
        let check = |latest: &str| update_exists(Some(&info(Some(latest), Some("f"))), "1.0.0");

        assert!(!check("latest"));
        assert!(!check("2"));
        assert!(!check("2.x.1"));
        assert!(!check(""));
        assert!(!check("1.2.3.4.5"));
    }

    #[test]
    fn test_availability_depends_on_state() {
        let newer = info(Some("999.0.0"), Some("file-1"));

        assert_eq!(
            UpdateAvailability::evaluate(Some(&newer), ConnectionState::Connected),
            UpdateAvailability::ReadyToUpdate
        );
        assert_eq!(
            UpdateAvailability::evaluate(Some(&newer), ConnectionState::Error),
            UpdateAvailability::Blocked
        );
        assert_eq!(
            UpdateAvailability::evaluate(None, ConnectionState::Connected),
            UpdateAvailability::UpToDate
        );
    }

    #[test]
    fn test_status_view_follows_state() {
        let view = StatusView::new(ConnectionState::InitError, UpdateAvailability::UpToDate);
        assert_eq!(view.tray, TrayIndicator::ConnectError);
        assert_eq!(view.server_status, "Failed");

        let error = StatusView::new(ConnectionState::Error, UpdateAvailability::UpToDate);
        assert_eq!(error.tray, view.tray);
        assert_ne!(error.detail, view.detail);

        assert_eq!(
            StatusView::new(ConnectionState::Idle, UpdateAvailability::UpToDate).tray,
            TrayIndicator::Waiting
        );
        assert_eq!(
            StatusView::new(ConnectionState::Connecting, UpdateAvailability::UpToDate).tray,
            TrayIndicator::Normal
        );
    }
}
