//! Shutdown coordinator: notify, close, reap, clean up.

use std::fs;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::registry::ChannelRegistry;
use super::spawn::{ReapOutcome, SpawnedWorker};

/// What the teardown sequence accomplished; every step is best-effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Channels that accepted the `quit` notification.
    pub notified: usize,
    /// Channels closed and removed from the registry.
    pub closed: usize,
    /// Children that exited on their own within the grace period.
    pub exited: usize,
    /// Children that ignored `quit` and had to be killed.
    pub killed: usize,
    /// Whether the well-known socket path was removed.
    pub socket_removed: bool,
}

/// Tear the supervisor down gracefully.
///
/// Sequence: take a stable snapshot of the registry, send `quit` to every
/// live channel (write failures mean the peer is already gone and are
/// ignored), close every channel, close the listener and unlink the
/// well-known socket path, then reap every spawned child with a bounded
/// wait and SIGKILL fallback. Individual failures are logged, never
/// propagated; after this returns the registry is empty and no child
/// process remains.
pub fn run(
    listener: UnixListener,
    socket_path: &Path,
    registry: &mut ChannelRegistry,
    children: &mut [SpawnedWorker],
    grace: Duration,
) -> ShutdownReport {
    let mut report = ShutdownReport::default();

    // Stable snapshot first; nothing below iterates a structure it mutates.
    let snapshot: Vec<String> = registry
        .all_active()
        .map(|handle| handle.interface().to_owned())
        .collect();
    info!(workers = snapshot.len(), "shutting down");

    for handle in registry.iter_mut() {
        match handle.notify_quit() {
            Ok(()) => {
                debug!(interface = %handle.interface(), "quit sent");
                report.notified += 1;
            }
            Err(e) => debug!(interface = %handle.interface(), error = %e, "quit not delivered"),
        }
    }

    report.closed = registry.drain_all().len();

    drop(listener);
    match fs::remove_file(socket_path) {
        Ok(()) => report.socket_removed = true,
        Err(e) => warn!(path = %socket_path.display(), error = %e, "socket path not removed"),
    }

    for child in children {
        match child.reap(grace) {
            ReapOutcome::Exited => report.exited += 1,
            ReapOutcome::Killed => report.killed += 1,
        }
    }

    info!(
        notified = report.notified,
        closed = report.closed,
        exited = report.exited,
        killed = report.killed,
        "shutdown complete"
    );
    report
}
