use std::process::Command;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

/// Observable relay state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    Running,
    /// Shutdown requested; no new connections or requests are served.
    Draining,
    Stopped,
}

/// Why draining began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// The network peer sent `Q`.
    HostCommand,
    /// Ctrl-C or another signal.
    Signal,
    /// The serial link failed or closed.
    SerialLost,
}

/// Host action run when the peer asks the robot to shut down.
pub trait HostShutdown: Send + Sync {
    fn schedule(&self);
}

/// Runs a shell command, e.g. `sudo shutdown +1`.
#[derive(Debug, Clone)]
pub struct ShellShutdown {
    command: String,
}

impl ShellShutdown {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl HostShutdown for ShellShutdown {
    fn schedule(&self) {
        info!(command = %self.command, "scheduling host shutdown");
        match Command::new("sh").arg("-c").arg(&self.command).spawn() {
            Ok(mut child) => {
                let command = self.command.clone();
                let reaper = thread::Builder::new()
                    .name("host-shutdown".to_string())
                    .spawn(move || match child.wait() {
                        Ok(status) if status.success() => {}
                        Ok(status) => warn!(%command, %status, "host shutdown command failed"),
                        Err(err) => warn!(%command, error = %err, "host shutdown command lost"),
                    });
                if let Err(err) = reaper {
                    warn!(error = %err, "could not watch host shutdown command");
                }
            }
            Err(err) => warn!(
                command = %self.command,
                error = %err,
                "could not run host shutdown command"
            ),
        }
    }
}

/// No host action; the relay just stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHostShutdown;

impl HostShutdown for NoHostShutdown {
    fn schedule(&self) {
        info!("no host shutdown command configured");
    }
}

/// Shared `Running -> Draining -> Stopped` state with waiters.
pub struct RelayLifecycle {
    state: Mutex<RelayState>,
    changed: Condvar,
    host: Box<dyn HostShutdown>,
}

impl RelayLifecycle {
    pub fn new(host: Box<dyn HostShutdown>) -> Self {
        Self {
            state: Mutex::new(RelayState::Running),
            changed: Condvar::new(),
            host,
        }
    }

    pub fn state(&self) -> RelayState {
        *self.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RelayState::Running
    }

    /// Move to `Draining`. Returns false if draining had already begun.
    ///
    /// The host action runs only for [`ShutdownReason::HostCommand`], and
    /// only on the first transition.
    pub fn begin_draining(&self, reason: ShutdownReason) -> bool {
        {
            let mut state = self.lock();
            if *state != RelayState::Running {
                return false;
            }
            *state = RelayState::Draining;
        }
        self.changed.notify_all();
        info!(reason = ?reason, "relay draining");

        if reason == ShutdownReason::HostCommand {
            self.host.schedule();
        }
        true
    }

    /// Move to `Stopped`.
    pub fn finish(&self) {
        *self.lock() = RelayState::Stopped;
        self.changed.notify_all();
        info!("relay stopped");
    }

    /// Block until the state is at least `target` or `timeout` passes.
    /// Returns the state observed last.
    pub fn wait_for(&self, target: RelayState, timeout: Duration) -> RelayState {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while *state < target {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *state
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RelayLifecycle {
    fn default() -> Self {
        Self::new(Box::new(NoHostShutdown))
    }
}

impl std::fmt::Debug for RelayLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLifecycle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
