//! Supervisor multiplexer: the single-threaded readiness loop over the
//! listening socket and every registered worker channel.

use std::io::ErrorKind;
use std::os::fd::{AsFd, RawFd};
use std::os::unix::net::UnixListener;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
use tracing::{debug, info, warn};

use crate::core::errors::{NetmondError, Result};
use crate::core::flag::ShutdownFlag;
use crate::protocol::{self, ControlMessage, LineReader};
use crate::stats::record::StatusRecord;

use super::registry::{ChannelRegistry, WorkerHandle};
use super::spawn::SpawnedWorker;

/// Consumer of decoded status records.
///
/// The production sink logs each record for the operator; tests collect
/// records to assert on ordering and content.
pub trait RecordSink {
    /// Accept one decoded record.
    fn deliver(&mut self, record: StatusRecord);
}

impl<F: FnMut(StatusRecord)> RecordSink for F {
    fn deliver(&mut self, record: StatusRecord) {
        self(record);
    }
}

/// Tunables for the readiness loop.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Bound on one readiness wait.
    ///
    /// `None` waits indefinitely and relies on signal delivery interrupting
    /// the wait (`EINTR`); hosts or tests that cannot rely on interruption
    /// set a bounded wait and trade shutdown latency for portability.
    pub poll_timeout: Option<Duration>,
    /// Bound on the synchronous handshake read, so a connected but silent
    /// client cannot wedge the accept path.
    pub handshake_timeout: Duration,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout: None,
            handshake_timeout: Duration::from_secs(2),
        }
    }
}

/// What one readiness wait observed.
struct Readiness {
    listener_ready: bool,
    channel_fds: Vec<RawFd>,
}

/// Whether a serviced channel stays in the watch set.
enum Disposition {
    Keep,
    Drop(&'static str),
}

/// Run the multiplexer until the shutdown flag is set.
///
/// Each iteration waits for readiness across the listener and all
/// registered channels, accepts and registers at most one new connection,
/// and drains records from every readable channel. The listener is part of
/// every wait, so a burst of data traffic can never starve registration.
/// All per-connection failures are contained here; only the shutdown flag
/// ends the loop.
pub fn run(
    listener: &UnixListener,
    registry: &mut ChannelRegistry,
    children: &[SpawnedWorker],
    flag: &ShutdownFlag,
    sink: &mut dyn RecordSink,
    config: &EventLoopConfig,
) -> Result<()> {
    while !flag.is_set() {
        let readiness = match wait_ready(listener, registry, config.poll_timeout) {
            Ok(Some(readiness)) => readiness,
            // Interrupted or timed out: back to the flag check.
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "readiness wait failed");
                continue;
            }
        };

        if readiness.listener_ready {
            match accept_one(listener, registry, children, config.handshake_timeout) {
                Ok(interface) => info!(%interface, "worker registered"),
                Err(e) => warn!(error = %e, "connection rejected"),
            }
        }

        for fd in readiness.channel_fds {
            service_channel(registry, fd, sink);
        }
    }
    Ok(())
}

/// Block until something is readable, the wait is interrupted by a signal,
/// or the optional bound elapses.
fn wait_ready(
    listener: &UnixListener,
    registry: &ChannelRegistry,
    timeout: Option<Duration>,
) -> Result<Option<Readiness>> {
    let watched = registry.fds();
    let mut pollfds = Vec::with_capacity(watched.len() + 1);
    pollfds.push(PollFd::new(listener.as_fd(), PollFlags::POLLIN));
    for handle in registry.all_active() {
        pollfds.push(PollFd::new(handle.borrow_fd(), PollFlags::POLLIN));
    }

    let poll_timeout = timeout.map_or(PollTimeout::NONE, |bound| {
        PollTimeout::from(u16::try_from(bound.as_millis()).unwrap_or(u16::MAX))
    });

    match poll(&mut pollfds, poll_timeout) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(Errno::EINTR) => {
            debug!("readiness wait interrupted by signal");
            return Ok(None);
        }
        Err(e) => {
            return Err(NetmondError::Io {
                context: "poll",
                source: std::io::Error::from(e),
            });
        }
    }

    let wake_flags =
        PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
    let ready = |pollfd: &PollFd<'_>| {
        pollfd
            .revents()
            .is_some_and(|revents| revents.intersects(wake_flags))
    };

    let listener_ready = ready(&pollfds[0]);
    // BTreeMap iteration order matches the `fds()` snapshot, so pollfds[1..]
    // lines up with `watched`.
    let channel_fds = watched
        .into_iter()
        .zip(&pollfds[1..])
        .filter(|(_, pollfd)| ready(pollfd))
        .map(|(fd, _)| fd)
        .collect();

    Ok(Some(Readiness {
        listener_ready,
        channel_fds,
    }))
}

/// Accept exactly one pending connection and run the registration half of
/// the handshake.
///
/// On any violation the connection is closed (dropped) without being
/// registered, and the listener remains able to accept subsequent
/// legitimate connections.
fn accept_one(
    listener: &UnixListener,
    registry: &mut ChannelRegistry,
    children: &[SpawnedWorker],
    handshake_timeout: Duration,
) -> Result<String> {
    let (mut stream, _addr) = listener.accept().map_err(|source| NetmondError::Io {
        context: "accept",
        source,
    })?;

    stream
        .set_read_timeout(Some(handshake_timeout))
        .map_err(|source| NetmondError::Io {
            context: "handshake timeout setup",
            source,
        })?;

    let mut reader = LineReader::new();
    let opening = protocol::read_line_blocking(&mut reader, &mut stream).map_err(|source| {
        NetmondError::Io {
            context: "handshake read",
            source,
        }
    })?;

    match opening.as_deref().map(ControlMessage::from_line) {
        Some(Some(ControlMessage::Ready)) => {}
        Some(_) => {
            return Err(NetmondError::ProtocolViolation {
                expected: protocol::READY.to_owned(),
                got: opening.unwrap_or_default(),
            });
        }
        None => {
            return Err(NetmondError::ProtocolViolation {
                expected: protocol::READY.to_owned(),
                got: "<eof>".to_owned(),
            });
        }
    }
    if reader.has_partial() {
        debug!("bytes after handshake token discarded");
    }

    // Correlate the connection with the spawned child via peer credentials.
    let pid = match getsockopt(&stream, PeerCredentials) {
        Ok(creds) => creds.pid(),
        Err(e) => {
            debug!(error = %e, "peer credentials unavailable");
            -1
        }
    };
    let interface = children
        .iter()
        .find(|child| i64::from(child.pid()) == i64::from(pid))
        .map_or_else(|| format!("peer-{pid}"), |child| child.interface().to_owned());

    let mut handle = WorkerHandle::new(interface.clone(), pid, stream);
    handle.activate().map_err(|source| NetmondError::Io {
        context: "handshake reply",
        source,
    })?;
    registry.register(handle)?;
    Ok(interface)
}

/// Drain one readable channel, dropping it on peer death.
fn service_channel(registry: &mut ChannelRegistry, fd: RawFd, sink: &mut dyn RecordSink) {
    let disposition = {
        let Some(handle) = registry.get_mut(fd) else {
            return;
        };
        match handle.fill() {
            Ok(0) => Disposition::Drop("peer closed"),
            Ok(_) => {
                while let Some(line) = handle.next_line() {
                    match StatusRecord::decode(&line) {
                        Ok(record) => sink.deliver(record),
                        // A malformed line degrades to a warning; the
                        // channel itself is still healthy.
                        Err(e) => {
                            warn!(interface = %handle.interface(), error = %e, "undecodable record");
                        }
                    }
                }
                Disposition::Keep
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Disposition::Keep
            }
            Err(e) => {
                warn!(interface = %handle.interface(), error = %e, "channel read failed");
                Disposition::Drop("read error")
            }
        }
    };

    if let Disposition::Drop(reason) = disposition
        && let Some(handle) = registry.unregister(fd)
    {
        info!(interface = %handle.interface(), reason, "worker unregistered");
    }
}
