//! cli
//!
//! Command-line interface layer for repobump.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Initialise logging and load configuration
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It builds a [`RemoteRepository`] from the loaded
//! configuration and hands it to the [`crate::updater`] and
//! [`crate::uploader`] workflows. Errors are reported through `anyhow`.
//!
//! [`RemoteRepository`]: crate::forge::RemoteRepository

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Config;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let ctx = commands::Context {
        config,
        json: cli.json,
    };
    commands::dispatch(cli.command, &ctx)
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `--debug` selects `debug` for this
/// crate and `warn` elsewhere.
fn init_logging(debug: bool) {
    let default = if debug {
        "warn,repobump=debug"
    } else {
        "warn,repobump=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
