#![warn(clippy::pedantic)]

//! # go-install
//!
//! Installs or upgrades the Go runtime under a chosen directory.
//!
//! The tool scrapes the Go download page for the archive matching the host
//! platform, compares its version with the runtime already installed, asks
//! for confirmation, downloads the archive with progress output, removes the
//! old `go` tree and unpacks the new one in its place.
//!
//! ## Subcommands
//!
//! - `install` - Install a Go runtime (the default when no subcommand is given)
//! - `version` - Display version information
//!
//! ## Examples
//!
//! Install the latest release under `/usr/local`:
//! ```bash
//! go-install -g /usr/local
//! ```
//!
//! Install a specific version without prompting:
//! ```bash
//! go-install install 1.17.8 -g ~/sdk --yes
//! ```

mod commands;
mod config;
mod errors;
mod toolchain;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, version};
use config::BuildInfo;
use tracing_subscriber::EnvFilter;

/// Go runtime installer.
#[derive(Parser)]
#[command(
    name = "go-install",
    author,
    version,
    about = "Installs or upgrades the Go runtime",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true,
    after_help = "\
ENVIRONMENT VARIABLES:
    GO_BASE                 Installation root (same as --go-base)
    GO_INSTALL_DIST_SERVER  Distribution server URL (default: https://go.dev)
    RUST_LOG                Log filter, overrides --verbose"
)]
pub struct Cli {
    /// Enable debug logging.
    #[clap(short = 'v', long = "verbose", global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Install arguments used when no subcommand is given.
    #[command(flatten)]
    pub install: install::InstallArgs,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the go-install CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a Go runtime.
    ///
    /// Resolves the requested release on the distribution server and
    /// replaces `<go-base>/go` with it.
    Install(install::InstallArgs),

    /// Display version information.
    ///
    /// Use -v or --verbose to include the commit and platform.
    Version,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints the error chain and returns the exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    1
}

/// Sends logs to stderr; `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let build = BuildInfo::from_env();

    match cli.command {
        Some(Commands::Version) => version::execute(&build, cli.verbose),
        Some(Commands::Install(args)) => install::execute(&args.into_config(build)?).await,
        None => install::execute(&cli.install.into_config(build)?).await,
    }
}
