//! Channel registry: the supervisor-side table of live worker channels.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::net::UnixStream;

use crate::core::errors::{NetmondError, Result};
use crate::protocol::{self, ControlMessage, LineReader};

/// Lifecycle of one spawned worker, as observed by the supervisor.
///
/// Transitions are linear: `Spawned` → `AwaitingHandshake` (connection
/// accepted) → `Active` (handshake complete) → `Disconnected` (peer closed
/// or errored) → `Reaped` (process wait completed). The process side of the
/// lifecycle (`Spawned`, `Reaped`) is tracked by the spawner; the channel
/// side lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Fork succeeded; no connection yet.
    Spawned,
    /// Connection accepted; handshake in progress.
    AwaitingHandshake,
    /// Handshake complete; channel registered and watched.
    Active,
    /// Peer closed or errored; channel removed from the watch set.
    Disconnected,
    /// Process wait completed.
    Reaped,
}

/// One registered worker channel.
///
/// Owns the accepted stream and its line reader. A handle in `Active` state
/// has exactly one valid channel, and no two live handles share one; both
/// properties fall out of the registry being keyed by the channel's fd.
#[derive(Debug)]
pub struct WorkerHandle {
    interface: String,
    pid: i32,
    state: WorkerState,
    stream: UnixStream,
    reader: LineReader,
}

impl WorkerHandle {
    /// Wrap an accepted connection whose opening `ready` has been read.
    ///
    /// Starts in `AwaitingHandshake`; [`activate`](Self::activate) completes
    /// the handshake and makes the channel watchable.
    #[must_use]
    pub fn new(interface: impl Into<String>, pid: i32, stream: UnixStream) -> Self {
        Self {
            interface: interface.into(),
            pid,
            state: WorkerState::AwaitingHandshake,
            stream,
            reader: LineReader::new(),
        }
    }

    /// Complete the handshake: send `start`, lift the handshake read bound,
    /// and mark the channel active.
    pub fn activate(&mut self) -> io::Result<()> {
        protocol::send(&mut self.stream, ControlMessage::Start)?;
        self.stream.set_read_timeout(None)?;
        self.state = WorkerState::Active;
        Ok(())
    }

    /// Interface this worker monitors.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Worker process id, from the socket's peer credentials.
    #[must_use]
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Channel identity used as the registry key.
    #[must_use]
    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Borrow the channel fd for the poll watch set.
    #[must_use]
    pub fn borrow_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }

    /// Pull one read's worth of bytes off the channel.
    ///
    /// Zero means orderly peer close.
    pub fn fill(&mut self) -> io::Result<usize> {
        self.reader.fill(&mut self.stream)
    }

    /// Pop the next complete buffered line.
    pub fn next_line(&mut self) -> Option<String> {
        self.reader.next_line()
    }

    /// Send the `quit` token; write failures mean the peer is already gone.
    pub fn notify_quit(&mut self) -> io::Result<()> {
        protocol::send(&mut self.stream, ControlMessage::Quit)
    }

    fn mark_disconnected(&mut self) {
        self.state = WorkerState::Disconnected;
    }
}

/// Mapping from channel fd to [`WorkerHandle`].
///
/// Mutated only by the supervisor's single thread, so no interior locking.
/// Every descriptor in the poll watch set has exactly one entry here: the
/// watch set is rebuilt from this table each loop iteration, which makes
/// registry removal and watch-set removal atomic by construction.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: std::collections::BTreeMap<RawFd, WorkerHandle>,
}

impl ChannelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handshake-complete channel.
    ///
    /// A duplicate fd is a programmer error under the single-writer
    /// discipline; it is surfaced as a coded error rather than a panic, and
    /// the offered handle is dropped (closing its stream).
    pub fn register(&mut self, handle: WorkerHandle) -> Result<()> {
        let fd = handle.fd();
        self.insert(fd, handle)
    }

    fn insert(&mut self, fd: RawFd, handle: WorkerHandle) -> Result<()> {
        match self.entries.entry(fd) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(NetmondError::ChannelAlreadyRegistered { fd })
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove a channel, returning its handle marked `Disconnected`.
    pub fn unregister(&mut self, fd: RawFd) -> Option<WorkerHandle> {
        self.entries.remove(&fd).map(|mut handle| {
            handle.mark_disconnected();
            handle
        })
    }

    /// Mutable access to one registered channel.
    pub fn get_mut(&mut self, fd: RawFd) -> Option<&mut WorkerHandle> {
        self.entries.get_mut(&fd)
    }

    /// Restartable snapshot sequence over currently registered handles.
    pub fn all_active(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.entries.values()
    }

    /// Mutable iteration, used for the shutdown broadcast.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkerHandle> {
        self.entries.values_mut()
    }

    /// Stable snapshot of registered fds.
    #[must_use]
    pub fn fds(&self) -> Vec<RawFd> {
        self.entries.keys().copied().collect()
    }

    /// Remove and return every handle, marked `Disconnected`.
    pub fn drain_all(&mut self) -> Vec<WorkerHandle> {
        let fds = self.fds();
        fds.into_iter()
            .filter_map(|fd| self.unregister(fd))
            .collect()
    }

    /// Number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channels are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
