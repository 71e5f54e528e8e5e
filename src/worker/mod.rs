//! Worker process: monitors exactly one interface and reports its status
//! over the supervisor's control socket until told to stop.

use std::io::{ErrorKind, Write as _};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::errors::{NetmondError, Result};
use crate::core::flag::ShutdownFlag;
use crate::protocol::{self, ControlMessage, LineReader};
use crate::stats::{LinkActivator, SysfsReader};

/// Bound on the worker-side wait for the `start` reply.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a worker needs to run; normally derived from the hidden
/// `worker` subcommand's arguments, which the supervisor fills in at spawn.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interface this worker owns.
    pub interface: String,
    /// Supervisor's well-known socket path.
    pub socket_path: PathBuf,
    /// Reporting interval.
    pub interval: Duration,
    /// Root of the sysfs-shaped statistics tree.
    pub sysfs_root: PathBuf,
}

/// What one inter-report wait observed.
enum Wait {
    /// Supervisor sent `quit`: stop reporting and exit cleanly.
    Quit,
    /// Channel closed underneath us.
    PeerClosed,
    /// Interval elapsed (or the wait was interrupted); keep reporting.
    Tick,
}

/// Run the worker to completion.
///
/// Connects to the supervisor (no retry; the supervisor listens before
/// spawning), performs the `ready`/`start` handshake, then loops: collect,
/// send, activate if down, wait one interval. The interval wait doubles as
/// the `quit` listen, so a `quit` stops the worker within one reporting
/// interval. A set stop flag, a write failure, or `quit` all end the loop
/// cleanly; only a failed connect or a handshake mismatch are errors.
pub fn run(config: &WorkerConfig, flag: &ShutdownFlag) -> Result<()> {
    let mut stream =
        UnixStream::connect(&config.socket_path).map_err(|source| NetmondError::Connect {
            path: config.socket_path.clone(),
            source,
        })?;

    handshake(&mut stream)?;
    info!(interface = %config.interface, "handshake complete, reporting");

    let reader = SysfsReader::new(&config.sysfs_root);
    let activator = LinkActivator::default();
    report_loop(&mut stream, &reader, &activator, config, flag)?;

    info!(interface = %config.interface, "worker stopping");
    Ok(())
}

/// Send `ready`, require `start` back.
fn handshake(stream: &mut UnixStream) -> Result<()> {
    let io_err = |context: &'static str| {
        move |source: std::io::Error| NetmondError::Io { context, source }
    };

    stream
        .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
        .map_err(io_err("handshake timeout setup"))?;
    protocol::send(stream, ControlMessage::Ready).map_err(io_err("handshake send"))?;

    let mut reader = LineReader::new();
    let reply = protocol::read_line_blocking(&mut reader, stream)
        .map_err(io_err("handshake read"))?
        .unwrap_or_else(|| "<eof>".to_owned());

    if ControlMessage::from_line(&reply) == Some(ControlMessage::Start) {
        Ok(())
    } else {
        Err(NetmondError::ProtocolViolation {
            expected: protocol::START.to_owned(),
            got: reply,
        })
    }
}

fn report_loop(
    stream: &mut UnixStream,
    reader: &SysfsReader,
    activator: &LinkActivator,
    config: &WorkerConfig,
    flag: &ShutdownFlag,
) -> Result<()> {
    // The read timeout below is the reporting interval: the blocking read
    // is both the sleep and the `quit` listen.
    stream
        .set_read_timeout(Some(config.interval))
        .map_err(|source| NetmondError::Io {
            context: "interval timeout setup",
            source,
        })?;
    let mut control = LineReader::new();

    while !flag.is_set() {
        let record = reader.collect(&config.interface);
        let down = record.is_down();
        let line = record.encode()?;

        if let Err(e) = stream.write_all(line.as_bytes()) {
            debug!(interface = %config.interface, error = %e, "supervisor gone");
            break;
        }
        debug!(interface = %config.interface, state = %record.operstate, "record sent");

        if down && let Err(e) = activator.bring_up(&config.interface) {
            warn!(error = %e, "activation attempt failed");
        }

        match wait_one_interval(&mut control, stream) {
            Wait::Quit => {
                info!(interface = %config.interface, "quit received");
                break;
            }
            Wait::PeerClosed => {
                debug!(interface = %config.interface, "channel closed");
                break;
            }
            Wait::Tick => {}
        }
    }
    Ok(())
}

/// Block for up to one interval on the channel, watching for `quit`.
fn wait_one_interval(control: &mut LineReader, stream: &mut UnixStream) -> Wait {
    match protocol::read_line_blocking(control, stream) {
        Ok(Some(line)) if ControlMessage::from_line(&line) == Some(ControlMessage::Quit) => {
            Wait::Quit
        }
        Ok(Some(line)) => {
            // Only `quit` flows supervisor to worker after the handshake.
            warn!(got = %line, "unexpected message from supervisor");
            Wait::Tick
        }
        Ok(None) => Wait::PeerClosed,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Wait::Tick,
        // Signal delivery; the loop condition re-checks the stop flag.
        Err(e) if e.kind() == ErrorKind::Interrupted => Wait::Tick,
        Err(e) => {
            debug!(error = %e, "control read failed");
            Wait::PeerClosed
        }
    }
}
