//! Top-level CLI definition and dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::core::errors::{NetmondError, Result};
use crate::core::flag::ShutdownFlag;
use crate::supervisor::Supervisor;
use crate::worker::{self, WorkerConfig};

/// netmond — per-interface worker processes supervised over a local socket.
#[derive(Parser)]
#[command(name = "netmond", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run the supervisor in the foreground.
    Run {
        /// Path to a TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Interface to monitor; repeat for several.
        #[arg(short = 'i', long = "interface")]
        interfaces: Vec<String>,
        /// Control socket path override.
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Reporting interval override, in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Sysfs root override (tests point this at a scratch tree).
        #[arg(long)]
        sysfs_root: Option<PathBuf>,
    },
    /// Worker process entry; spawned by the supervisor, not for operators.
    #[command(hide = true)]
    Worker {
        /// Interface this worker owns.
        interface: String,
        /// Supervisor's control socket path.
        #[arg(long)]
        socket: PathBuf,
        /// Reporting interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Sysfs root.
        #[arg(long)]
        sysfs_root: Option<PathBuf>,
    },
}

/// Dispatch the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            config,
            interfaces,
            socket,
            interval_ms,
            sysfs_root,
        } => {
            let mut config = config
                .map(|path| Config::load(&path))
                .transpose()?
                .unwrap_or_default();
            if !interfaces.is_empty() {
                config.interfaces = interfaces;
            }
            if let Some(socket) = socket {
                config.socket_path = socket;
            }
            if let Some(interval_ms) = interval_ms {
                config.interval_ms = interval_ms;
            }
            if let Some(sysfs_root) = sysfs_root {
                config.sysfs_root = sysfs_root;
            }
            config.validate()?;

            let flag = ShutdownFlag::new();
            flag.register_signals()?;
            let mut supervisor = Supervisor::new(config);
            let report = supervisor.run(&flag)?;
            info!(
                exited = report.exited,
                killed = report.killed,
                "supervisor stopped"
            );
            Ok(())
        }
        Command::Worker {
            interface,
            socket,
            interval_ms,
            sysfs_root,
        } => {
            let flag = ShutdownFlag::new();
            flag.register_signals()?;
            let config = WorkerConfig {
                interface,
                socket_path: socket,
                interval: Duration::from_millis(interval_ms.max(1)),
                sysfs_root: sysfs_root
                    .unwrap_or_else(|| PathBuf::from(crate::stats::sysfs::DEFAULT_SYSFS_ROOT)),
            };
            worker::run(&config, &flag)
        }
    }
}

/// Process exit code for a failed run.
///
/// Workers exit 1 on a failed initial connection and 2 on a handshake
/// mismatch; everything else (including supervisor fatals) maps to 1.
#[must_use]
pub const fn exit_code(err: &NetmondError) -> i32 {
    match err {
        NetmondError::ProtocolViolation { .. } => 2,
        _ => 1,
    }
}
