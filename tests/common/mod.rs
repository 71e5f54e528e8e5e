//! Shared fixtures for integration tests.

#![allow(dead_code)] // each test binary uses a subset of these helpers

use std::fs;
use std::io::Write as _;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use netmond::protocol::{self, ControlMessage, LineReader};

/// Lay out a fake `/sys/class/net/<interface>` subtree and return its root.
pub fn fake_sysfs(root: &Path, interface: &str, operstate: &str, rx_bytes: u64) -> PathBuf {
    let base = root.join("sys").join(interface);
    fs::create_dir_all(base.join("statistics")).unwrap();
    fs::write(base.join("operstate"), format!("{operstate}\n")).unwrap();
    fs::write(base.join("carrier_up_count"), "1\n").unwrap();
    fs::write(base.join("carrier_down_count"), "0\n").unwrap();
    for (stat, value) in [
        ("rx_bytes", rx_bytes),
        ("rx_packets", 5),
        ("rx_errors", 0),
        ("rx_dropped", 0),
        ("tx_bytes", 64),
        ("tx_packets", 2),
        ("tx_errors", 0),
        ("tx_dropped", 0),
    ] {
        fs::write(base.join("statistics").join(stat), format!("{value}\n")).unwrap();
    }
    root.join("sys")
}

/// A test-side stand-in for a worker: connected and handshake-complete.
pub struct FakeWorker {
    pub stream: UnixStream,
    pub reader: LineReader,
}

impl FakeWorker {
    /// Connect and complete the `ready`/`start` handshake.
    pub fn connect(socket_path: &Path) -> Self {
        let mut worker = Self::connect_raw(socket_path);
        protocol::send(&mut worker.stream, ControlMessage::Ready).unwrap();
        let reply = worker.read_line().expect("supervisor closed during handshake");
        assert_eq!(ControlMessage::from_line(&reply), Some(ControlMessage::Start));
        worker
    }

    /// Connect without performing the handshake.
    pub fn connect_raw(socket_path: &Path) -> Self {
        Self {
            stream: retry_connect(socket_path),
            reader: LineReader::new(),
        }
    }

    /// Send one raw line to the supervisor.
    pub fn send_line(&mut self, line: &str) {
        self.stream.write_all(line.as_bytes()).unwrap();
        self.stream.write_all(b"\n").unwrap();
    }

    /// Block until one line arrives (used to observe `quit`).
    pub fn read_line(&mut self) -> Option<String> {
        protocol::read_line_blocking(&mut self.reader, &mut self.stream).unwrap()
    }
}

/// Connect with retries; the supervisor thread may not have bound yet.
pub fn retry_connect(socket_path: &Path) -> UnixStream {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match UnixStream::connect(socket_path) {
            Ok(stream) => return stream,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
            Err(e) => panic!("cannot connect to {}: {e}", socket_path.display()),
        }
    }
}

/// Spin until `predicate` holds or the timeout elapses.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    predicate()
}

/// Wait for a child process with a bound, killing it on timeout.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "child {} did not exit within {timeout:?}",
            child.id()
        );
        thread::sleep(Duration::from_millis(20));
    }
}
