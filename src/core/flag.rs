//! Cancellation flag shared between a process and its signal handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{NetmondError, Result};

/// Cooperative shutdown flag.
///
/// Owned by the process's main control structure and passed by reference to
/// loops and wait primitives. Signal handlers only ever set the flag; they
/// never terminate the process, so the current loop iteration always gets to
/// exit cleanly. Both the supervisor and each worker carry one of these.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install SIGINT and SIGTERM handlers that set this flag.
    pub fn register_signals(&self) -> Result<()> {
        for sig in [SIGINT, SIGTERM] {
            signal_hook::flag::register(sig, Arc::clone(&self.inner)).map_err(|source| {
                NetmondError::Io {
                    context: "signal handler registration",
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Request shutdown.
    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_unset_and_latches() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
        flag.set();
        assert!(flag.is_set());
        // Clones observe the same state.
        let other = flag.clone();
        assert!(other.is_set());
    }
}
