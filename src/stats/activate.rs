//! Link activation for interfaces reported in a down state.

use std::path::PathBuf;
use std::process::Command;

use tracing::{info, warn};

use crate::core::errors::{NetmondError, Result};

/// Brings an interface to an active operational state.
///
/// Shells out to `ip link set dev <interface> up`. Success or failure is
/// logged by the caller and is never fatal to the reporting loop. The
/// program path is injectable for tests.
#[derive(Debug, Clone)]
pub struct LinkActivator {
    program: PathBuf,
}

impl Default for LinkActivator {
    fn default() -> Self {
        Self::new("ip")
    }
}

impl LinkActivator {
    /// Activator that invokes `program` in place of `ip`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Attempt to bring `interface` up.
    pub fn bring_up(&self, interface: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(["link", "set", "dev", interface, "up"])
            .status()
            .map_err(|e| NetmondError::Activate {
                interface: interface.to_owned(),
                details: e.to_string(),
            })?;

        if status.success() {
            info!(interface, "link activation requested");
            Ok(())
        } else {
            warn!(interface, %status, "link activation command failed");
            Err(NetmondError::Activate {
                interface: interface.to_owned(),
                details: format!("exit status {status}"),
            })
        }
    }
}
