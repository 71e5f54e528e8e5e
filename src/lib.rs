//! netmond — a supervisor/worker network interface monitor.
//!
//! The supervisor binds a well-known Unix socket, spawns one worker process
//! per monitored interface (fault isolation: a worker crash cannot corrupt
//! the supervisor), and multiplexes all worker channels on a single thread.
//! Workers connect back, complete a `ready`/`start` handshake, then stream
//! one status record per reporting interval until the supervisor sends
//! `quit` or either side closes the channel.
//!
//! # Modules
//!
//! - [`protocol`]: handshake tokens and the line-delimited frame codec
//! - [`stats`]: status records, the sysfs counter reader, link activation
//! - [`supervisor`]: registry, multiplexer loop, spawning, shutdown
//! - [`worker`]: the per-interface worker process
//! - [`core`](crate::core): error taxonomy and the shared cancellation flag
//! - [`config`]: TOML configuration with CLI overrides
//! - [`cli_app`]: clap definition and dispatch

pub mod cli_app;
pub mod config;
pub mod core;
pub mod protocol;
pub mod stats;
pub mod supervisor;
pub mod worker;
