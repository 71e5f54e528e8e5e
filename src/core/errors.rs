//! NM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, NetmondError>;

/// Top-level error type for netmond.
#[derive(Debug, Error)]
pub enum NetmondError {
    #[error("[NM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[NM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[NM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[NM-2001] cannot bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[NM-2002] protocol violation: expected {expected:?}, got {got:?}")]
    ProtocolViolation { expected: String, got: String },

    #[error("[NM-2003] channel fd {fd} already registered")]
    ChannelAlreadyRegistered { fd: i32 },

    #[error("[NM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[NM-3001] cannot connect to supervisor at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[NM-3002] IO failure in {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("[NM-3101] failed to spawn worker for {interface}: {details}")]
    Spawn { interface: String, details: String },

    #[error("[NM-3102] failed to activate {interface}: {details}")]
    Activate { interface: String, details: String },
}

impl NetmondError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "NM-1001",
            Self::MissingConfig { .. } => "NM-1002",
            Self::ConfigParse { .. } => "NM-1003",
            Self::Bind { .. } => "NM-2001",
            Self::ProtocolViolation { .. } => "NM-2002",
            Self::ChannelAlreadyRegistered { .. } => "NM-2003",
            Self::Serialization { .. } => "NM-2101",
            Self::Connect { .. } => "NM-3001",
            Self::Io { .. } => "NM-3002",
            Self::Spawn { .. } => "NM-3101",
            Self::Activate { .. } => "NM-3102",
        }
    }

    /// Whether the supervisor cannot continue past this failure.
    ///
    /// Only configuration problems and a failed bind of the well-known
    /// control socket are fatal; everything else is contained at the
    /// channel or worker boundary.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::Bind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_embedded_in_messages() {
        let err = NetmondError::Spawn {
            interface: "eth0".into(),
            details: "no such file".into(),
        };
        assert_eq!(err.code(), "NM-3101");
        assert!(err.to_string().contains("NM-3101"));
        assert!(err.to_string().contains("eth0"));
    }

    #[test]
    fn only_startup_failures_are_fatal() {
        let bind = NetmondError::Bind {
            path: "/tmp/x.sock".into(),
            source: std::io::Error::other("denied"),
        };
        assert!(bind.is_fatal());

        let violation = NetmondError::ProtocolViolation {
            expected: "ready".into(),
            got: "bogus".into(),
        };
        assert!(!violation.is_fatal());
    }
}
