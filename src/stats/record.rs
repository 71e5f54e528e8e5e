//! Periodic status report for one monitored interface.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{NetmondError, Result};

/// Operstate value reported when the sysfs node is unreadable.
pub const STATE_UNKNOWN: &str = "unknown";
/// Operstate value that triggers the activator.
pub const STATE_DOWN: &str = "down";

/// The eight traffic counters plus carrier transition counts.
///
/// Any counter the kernel does not expose for an interface reads as zero;
/// a missing counter degrades the record, it never fails collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
    pub carrier_up_count: u64,
    pub carrier_down_count: u64,
}

/// One immutable periodic report, produced by a worker and consumed by the
/// supervisor for display only.
///
/// Wire form is one JSON object per newline-terminated line: human-readable,
/// line-oriented, one record per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Interface this record describes.
    pub interface: String,
    /// Textual operational state (`up`, `down`, `unknown`, ...).
    pub operstate: String,
    /// Collection time, stamped by the worker.
    pub collected_at: DateTime<Utc>,
    /// Counter snapshot.
    #[serde(flatten)]
    pub counters: InterfaceCounters,
}

impl StatusRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn new(interface: impl Into<String>, operstate: impl Into<String>, counters: InterfaceCounters) -> Self {
        Self {
            interface: interface.into(),
            operstate: operstate.into(),
            collected_at: Utc::now(),
            counters,
        }
    }

    /// Whether the interface reports a down operational state.
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.operstate == STATE_DOWN
    }

    /// Encode as one wire line, newline included.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).map_err(|e| NetmondError::Serialization {
            context: "status record encode",
            details: e.to_string(),
        })?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one received line (newline already stripped).
    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| NetmondError::Serialization {
            context: "status record decode",
            details: e.to_string(),
        })
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        write!(
            f,
            "{} state={} up_count={} down_count={} \
             rx[bytes={} packets={} errors={} dropped={}] \
             tx[bytes={} packets={} errors={} dropped={}]",
            self.interface,
            self.operstate,
            c.carrier_up_count,
            c.carrier_down_count,
            c.rx_bytes,
            c.rx_packets,
            c.rx_errors,
            c.rx_dropped,
            c.tx_bytes,
            c.tx_packets,
            c.tx_errors,
            c.tx_dropped,
        )
    }
}
