//! Worker process spawning: one child per monitored interface.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::core::errors::{NetmondError, Result};

use super::registry::WorkerState;

/// How often the bounded reap re-checks a child that has not exited yet.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a child ultimately left the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Child exited on its own within the grace period.
    Exited,
    /// Child ignored `quit`; killed after the grace period, then waited.
    Killed,
}

/// One spawned worker process.
///
/// Tracks the process side of the worker lifecycle (`Spawned` at creation,
/// `Reaped` after the wait completes); the channel side lives on the
/// registry's [`WorkerHandle`](super::registry::WorkerHandle).
#[derive(Debug)]
pub struct SpawnedWorker {
    interface: String,
    child: Child,
    state: WorkerState,
}

impl SpawnedWorker {
    /// Interface the child monitors.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// OS process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Process-side lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Wait for the child with a bound.
    ///
    /// Polls `try_wait` for up to `grace`; a child still running after that
    /// ignored `quit`, so it is forcefully killed and then reaped with a
    /// final blocking wait. Either way the child is out of the process
    /// table when this returns.
    pub fn reap(&mut self, grace: Duration) -> ReapOutcome {
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    info!(interface = %self.interface, pid = self.pid(), %status, "worker reaped");
                    self.state = WorkerState::Reaped;
                    return ReapOutcome::Exited;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    // No child to wait for; treat as already reaped.
                    warn!(interface = %self.interface, error = %e, "wait failed");
                    self.state = WorkerState::Reaped;
                    return ReapOutcome::Exited;
                }
            }
        }

        warn!(interface = %self.interface, pid = self.pid(), "worker ignored quit; killing");
        if let Err(e) = self.child.kill() {
            warn!(interface = %self.interface, error = %e, "kill failed");
        }
        match self.child.wait() {
            Ok(status) => info!(interface = %self.interface, %status, "worker reaped after kill"),
            Err(e) => warn!(interface = %self.interface, error = %e, "wait after kill failed"),
        }
        self.state = WorkerState::Reaped;
        ReapOutcome::Killed
    }
}

/// Spawns worker processes by re-invoking this binary's hidden `worker`
/// subcommand.
#[derive(Debug, Clone)]
pub struct WorkerSpawner {
    program: PathBuf,
    socket_path: PathBuf,
    interval: Duration,
    sysfs_root: PathBuf,
}

impl WorkerSpawner {
    /// Spawner that runs `program worker <interface> ...`.
    ///
    /// `program` is normally the current executable; tests substitute a
    /// bogus path to simulate spawn failure.
    #[must_use]
    pub fn new(
        program: impl Into<PathBuf>,
        socket_path: impl Into<PathBuf>,
        interval: Duration,
        sysfs_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            socket_path: socket_path.into(),
            interval,
            sysfs_root: sysfs_root.into(),
        }
    }

    /// Spawn one worker.
    pub fn spawn_one(&self, interface: &str) -> Result<SpawnedWorker> {
        let child = Command::new(&self.program)
            .arg("worker")
            .arg(interface)
            .arg("--socket")
            .arg(&self.socket_path)
            .arg("--interval-ms")
            .arg(self.interval.as_millis().to_string())
            .arg("--sysfs-root")
            .arg(&self.sysfs_root)
            .spawn()
            .map_err(|e| NetmondError::Spawn {
                interface: interface.to_owned(),
                details: e.to_string(),
            })?;

        info!(interface, pid = child.id(), "worker spawned");
        Ok(SpawnedWorker {
            interface: interface.to_owned(),
            child,
            state: WorkerState::Spawned,
        })
    }

    /// Spawn a worker for every interface.
    ///
    /// A spawn failure is logged and that interface is simply not
    /// monitored; the remaining workers proceed.
    pub fn spawn_all(&self, interfaces: &[String]) -> Vec<SpawnedWorker> {
        let mut children = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            match self.spawn_one(interface) {
                Ok(child) => children.push(child),
                Err(e) => error!(interface, error = %e, "worker spawn failed"),
            }
        }
        children
    }
}
