//! Counter collection from the kernel's per-interface sysfs tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::record::{InterfaceCounters, STATE_UNKNOWN, StatusRecord};

/// Default sysfs root on Linux.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/net";

/// The eight per-interface traffic counters under `statistics/`.
const STAT_NAMES: [&str; 8] = [
    "rx_bytes",
    "rx_packets",
    "rx_errors",
    "rx_dropped",
    "tx_bytes",
    "tx_packets",
    "tx_errors",
    "tx_dropped",
];

/// Reads interface state and counters from a sysfs-shaped tree.
///
/// The root is injectable so tests can point at a scratch directory laid out
/// like `/sys/class/net`. Collection is infallible by design: any individual
/// node that cannot be read degrades to zero (counters) or `unknown`
/// (operstate) rather than failing the reporting loop.
#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

impl Default for SysfsReader {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl SysfsReader {
    /// Reader over a sysfs-shaped tree rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Collect a full status record for `interface`.
    #[must_use]
    pub fn collect(&self, interface: &str) -> StatusRecord {
        let base = self.root.join(interface);
        let operstate =
            read_string(&base.join("operstate")).unwrap_or_else(|| STATE_UNKNOWN.to_owned());

        let mut counters = InterfaceCounters {
            carrier_up_count: read_u64(&base.join("carrier_up_count")),
            carrier_down_count: read_u64(&base.join("carrier_down_count")),
            ..InterfaceCounters::default()
        };
        for name in STAT_NAMES {
            let value = read_u64(&base.join("statistics").join(name));
            match name {
                "rx_bytes" => counters.rx_bytes = value,
                "rx_packets" => counters.rx_packets = value,
                "rx_errors" => counters.rx_errors = value,
                "rx_dropped" => counters.rx_dropped = value,
                "tx_bytes" => counters.tx_bytes = value,
                "tx_packets" => counters.tx_packets = value,
                "tx_errors" => counters.tx_errors = value,
                _ => counters.tx_dropped = value,
            }
        }

        StatusRecord::new(interface, operstate, counters)
    }
}

fn read_string(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_owned()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "sysfs node unreadable");
            None
        }
    }
}

fn read_u64(path: &Path) -> u64 {
    read_string(path)
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}
