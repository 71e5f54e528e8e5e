//! netmond binary entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use netmond::cli_app::{self, Cli};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli_app::run(cli) {
        tracing::error!(code = e.code(), "{e}");
        std::process::exit(cli_app::exit_code(&e));
    }
}
