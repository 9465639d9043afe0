use crate::source::scanner::file_name_of;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessStatus, System};
use tracing::debug;

/// Bracketed decimal process id anywhere in a file name, e.g. `app[4821]_monitor.log`.
const PID_TOKEN_PATTERN: &str = r"\[(\d+)\]";

/// Answers whether a process id belongs to a running process.
pub trait ProcessProbe: Send + Sync {
    fn is_running(&self, pid: u32) -> bool;
}

/// Process table of the local machine.
pub struct SystemProcesses {
    system: Mutex<System>,
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessProbe for SystemProcesses {
    fn is_running(&self, pid: u32) -> bool {
        let Ok(mut system) = self.system.lock() else {
            return false;
        };

        let pid = Pid::from_u32(pid);
        if !system.refresh_process(pid) {
            return false;
        }

        system
            .process(pid)
            .map(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
            .unwrap_or(false)
    }
}

/// Decides whether a log file is still owned by a running writer.
#[derive(Clone)]
pub struct LivenessCheck {
    pid_token: Regex,
    probe: Arc<dyn ProcessProbe>,
}

impl Default for LivenessCheck {
    fn default() -> Self {
        Self::new(Arc::new(SystemProcesses::default()))
    }
}

impl LivenessCheck {
    pub fn new(probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            pid_token: Regex::new(PID_TOKEN_PATTERN).expect("pid token pattern is valid"),
            probe,
        }
    }

    /// Process id embedded in the file name, if any.
    pub fn owning_pid(&self, path: &Path) -> Option<u32> {
        let name = file_name_of(path);
        let captures = self.pid_token.captures(&name)?;
        match captures[1].parse::<u32>() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(file = %name, error = %e, "Process id token out of range");
                None
            }
        }
    }

    /// A file is live iff its name carries a process id and that process is
    /// still running. No token, an unparseable token, or a failed lookup all
    /// count as not live.
    pub fn is_live(&self, path: &Path) -> bool {
        match self.owning_pid(path) {
            Some(pid) => self.probe.is_running(pid),
            None => false,
        }
    }
}
