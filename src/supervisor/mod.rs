//! Supervisor: spawns one worker per interface, multiplexes their channels,
//! and coordinates shutdown.

pub mod event_loop;
pub mod registry;
pub mod shutdown;
pub mod spawn;

use std::env;
use std::fs;
use std::os::unix::net::UnixListener;
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::core::errors::{NetmondError, Result};
use crate::core::flag::ShutdownFlag;
use crate::stats::record::StatusRecord;

use event_loop::EventLoopConfig;
use registry::ChannelRegistry;
use shutdown::ShutdownReport;
use spawn::WorkerSpawner;

/// Whole-process state machine for the supervisor.
///
/// `Starting → Listening → Running → ShuttingDown → Stopped`. The only
/// transition out of `Running` is the shutdown signal; `Stopped` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Process started; control socket not yet bound.
    Starting,
    /// Control socket bound; workers being spawned.
    Listening,
    /// Multiplexer loop running.
    Running,
    /// Shutdown signal received; teardown in progress.
    ShuttingDown,
    /// Teardown complete.
    Stopped,
}

/// The supervisor process: owns the configuration and drives the
/// listen → spawn → multiplex → shutdown sequence.
#[derive(Debug)]
pub struct Supervisor {
    config: Config,
    state: SupervisorState,
}

impl Supervisor {
    /// Supervisor for the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: SupervisorState::Starting,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run to completion: bind, spawn, multiplex until `flag` is set, then
    /// tear down.
    ///
    /// Only a failed bind of the control socket (or a missing current
    /// executable) is fatal; everything after the listener exists is
    /// contained per-worker.
    pub fn run(&mut self, flag: &ShutdownFlag) -> Result<ShutdownReport> {
        let listener = bind_control_socket(&self.config.socket_path)?;
        self.state = SupervisorState::Listening;
        info!(path = %self.config.socket_path.display(), "control socket bound");

        // Workers are spawned only after the well-known endpoint exists, so
        // their no-retry connect is safe.
        let program = env::current_exe().map_err(|source| NetmondError::Io {
            context: "current executable lookup",
            source,
        })?;
        let spawner = WorkerSpawner::new(
            program,
            &self.config.socket_path,
            self.config.interval(),
            &self.config.sysfs_root,
        );
        let mut children = spawner.spawn_all(&self.config.interfaces);
        info!(
            requested = self.config.interfaces.len(),
            spawned = children.len(),
            "workers spawned"
        );

        let mut registry = ChannelRegistry::new();
        let mut sink = |record: StatusRecord| info!(target: "netmond::report", "{record}");
        let loop_config = EventLoopConfig {
            handshake_timeout: self.config.handshake_timeout(),
            ..EventLoopConfig::default()
        };

        self.state = SupervisorState::Running;
        event_loop::run(
            &listener,
            &mut registry,
            &children,
            flag,
            &mut sink,
            &loop_config,
        )?;

        self.state = SupervisorState::ShuttingDown;
        let report = shutdown::run(
            listener,
            &self.config.socket_path,
            &mut registry,
            &mut children,
            self.config.reap_grace(),
        );
        self.state = SupervisorState::Stopped;
        Ok(report)
    }
}

/// Create the well-known listening endpoint.
///
/// A stale socket file from a previous run is unlinked first; an actual
/// bind failure is fatal, since no worker could ever connect.
pub fn bind_control_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        match fs::remove_file(path) {
            Ok(()) => warn!(path = %path.display(), "removed stale control socket"),
            Err(e) => warn!(path = %path.display(), error = %e, "stale socket not removed"),
        }
    }
    UnixListener::bind(path).map_err(|source| NetmondError::Bind {
        path: path.to_path_buf(),
        source,
    })
}
