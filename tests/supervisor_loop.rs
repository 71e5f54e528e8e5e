//! In-process multiplexer and shutdown coordination tests.
//!
//! These drive the supervisor's event loop with test-side fake workers
//! (plain Unix stream clients) instead of spawned processes, so registry
//! contents and record flow can be asserted directly.

mod common;

use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use netmond::core::flag::ShutdownFlag;
use netmond::stats::record::{InterfaceCounters, StatusRecord};
use netmond::supervisor::bind_control_socket;
use netmond::supervisor::event_loop::{self, EventLoopConfig};
use netmond::supervisor::registry::ChannelRegistry;
use netmond::supervisor::shutdown;
use tempfile::TempDir;

use common::FakeWorker;

type SharedRecords = Arc<Mutex<Vec<StatusRecord>>>;

struct LoopHarness {
    socket_path: PathBuf,
    flag: ShutdownFlag,
    records: SharedRecords,
    handle: JoinHandle<(UnixListener, ChannelRegistry)>,
    dir: TempDir,
}

impl LoopHarness {
    /// Bind a control socket in a scratch dir and run the multiplexer on a
    /// background thread with a bounded poll so the flag is noticed without
    /// signal delivery.
    fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let socket_path = dir.path().join("control.sock");
        let listener = bind_control_socket(&socket_path).unwrap();

        let flag = ShutdownFlag::new();
        let records: SharedRecords = Arc::new(Mutex::new(Vec::new()));

        let loop_flag = flag.clone();
        let loop_records = Arc::clone(&records);
        let handle = std::thread::spawn(move || {
            let mut registry = ChannelRegistry::new();
            let mut sink =
                move |record: StatusRecord| loop_records.lock().unwrap().push(record);
            let config = EventLoopConfig {
                poll_timeout: Some(Duration::from_millis(50)),
                handshake_timeout: Duration::from_secs(1),
            };
            event_loop::run(&listener, &mut registry, &[], &loop_flag, &mut sink, &config)
                .unwrap();
            (listener, registry)
        });

        Self {
            socket_path,
            flag,
            records,
            handle,
            dir,
        }
    }

    fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop the loop and hand back the pieces needed for assertions.
    ///
    /// The scratch dir is returned too: dropping it would delete the socket
    /// path out from under the shutdown coordinator.
    fn stop(self) -> (UnixListener, ChannelRegistry, SharedRecords, PathBuf, TempDir) {
        self.flag.set();
        let (listener, registry) = self.handle.join().unwrap();
        (listener, registry, self.records, self.socket_path, self.dir)
    }
}

fn record(interface: &str, rx_bytes: u64) -> StatusRecord {
    StatusRecord::new(
        interface,
        "up",
        InterfaceCounters {
            rx_bytes,
            ..InterfaceCounters::default()
        },
    )
}

#[test]
fn bogus_handshake_is_never_registered_and_listener_survives() {
    let harness = LoopHarness::start();

    // A client that violates the handshake is dropped without registration.
    let mut bogus = FakeWorker::connect_raw(harness.socket_path());
    bogus.send_line("bogus");
    // The supervisor closes the offending connection.
    assert_eq!(bogus.read_line(), None);

    // A subsequent legitimate connection still completes the handshake.
    let _legit = FakeWorker::connect(harness.socket_path());

    let (_listener, registry, _records, _path, _dir) = harness.stop();
    assert_eq!(registry.len(), 1);
}

#[test]
fn records_from_one_worker_preserve_send_order() {
    let harness = LoopHarness::start();
    let mut worker = FakeWorker::connect(harness.socket_path());

    let first = record("fake0", 1);
    let second = record("fake0", 2);
    worker.send_line(first.encode().unwrap().trim_end());
    worker.send_line(second.encode().unwrap().trim_end());

    let records = Arc::clone(&harness.records);
    assert!(common::wait_until(Duration::from_secs(5), || records
        .lock()
        .unwrap()
        .len()
        >= 2));

    let (_listener, registry, records, _path, _dir) = harness.stop();
    let seen = records.lock().unwrap();
    assert_eq!(seen[0], first);
    assert_eq!(seen[1], second);
    assert_eq!(registry.len(), 1);
}

#[test]
fn disconnected_worker_is_unregistered_without_disturbing_others() {
    let harness = LoopHarness::start();
    let survivor = FakeWorker::connect(harness.socket_path());
    let casualty = FakeWorker::connect(harness.socket_path());

    // Orderly close: the supervisor sees a zero-length read and drops it.
    drop(casualty);

    // The close wakes the poll immediately; give the loop a moment to
    // service it and unregister.
    std::thread::sleep(Duration::from_millis(200));

    let (_listener, registry, _records, _path, _dir) = harness.stop();
    assert_eq!(registry.len(), 1);
    drop(survivor);
}

#[test]
fn registry_holds_exactly_the_workers_that_connected_and_handshook() {
    // Three interfaces configured, one worker "fails to spawn" (it simply
    // never connects): the registry must hold exactly the other two, and
    // shutdown must still succeed.
    let harness = LoopHarness::start();
    let mut first = FakeWorker::connect(harness.socket_path());
    let mut second = FakeWorker::connect(harness.socket_path());
    // Third worker: spawn failure simulated by absence.

    let (listener, mut registry, _records, socket_path, _dir) = harness.stop();
    assert_eq!(registry.len(), 2);

    let report = shutdown::run(
        listener,
        &socket_path,
        &mut registry,
        &mut [],
        Duration::from_millis(200),
    );

    assert_eq!(report.notified, 2);
    assert_eq!(report.closed, 2);
    assert!(report.socket_removed);
    assert!(registry.is_empty());
    assert!(!socket_path.exists());

    // Both live workers observed the quit broadcast.
    assert_eq!(first.read_line().as_deref(), Some("quit"));
    assert_eq!(second.read_line().as_deref(), Some("quit"));
}
