#![warn(clippy::pedantic)]

//! # Client Binary Manager CLI (clientbin)
//!
//! The `clientbin` command discovers, verifies and provisions the external
//! client binaries described by a JSON catalog.
//!
//! ## Subcommands
//!
//! - `scan` - Look for every supported client on this host and report its state
//! - `download` - Fetch, verify and install one client
//! - `list` - Show the clients the catalog supports on this platform
//!
//! ## Examples
//!
//! Scan the host, also searching a tools folder:
//! ```bash
//! clientbin --catalog clients.json scan --folder /opt/tools
//! ```
//!
//! Provision a client into the default download directory:
//! ```bash
//! clientbin --catalog clients.json download Geth
//! ```

mod commands;
mod errors;
mod paths;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{download, list, scan};
use errors::CliError;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

/// Client binary manager.
#[derive(Parser)]
#[command(
    name = "clientbin",
    author,
    version,
    about = "Discovers, verifies and provisions external client binaries",
    after_help = "\
ENVIRONMENT VARIABLES:
    CLIENTBIN_CATALOG       Catalog document used when --catalog is omitted
    CLIENTBIN_HOME          Download directory (default: <data dir>/clientbin/downloads)
    RUST_LOG                Log filter, overrides --verbose"
)]
pub struct Cli {
    /// Path to the client catalog JSON document.
    #[clap(long, env = "CLIENTBIN_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// Log debug diagnostics to stderr.
    #[clap(short, long, global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the clientbin CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Scan the host for supported clients.
    ///
    /// Searches the executable search path and any extra folders, runs each
    /// client's sanity probe and prints the resulting records as JSON.
    Scan(scan::ScanArgs),

    /// Download and install a client.
    ///
    /// Fetches the archive declared in the catalog, checks its digests,
    /// unpacks it and verifies the installed binary.
    Download(download::DownloadArgs),

    /// List clients supported on this platform.
    List,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// A client that was installed but failed verification exits with 2; every
/// other failure prints the error chain and exits with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(err @ CliError::ClientUnavailable { .. }) = e.downcast_ref::<CliError>() {
        eprintln!("Error: {err}");
        return 2;
    }
    eprintln!("Error: {e:?}");
    1
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,clientbin=debug")
        } else {
            EnvFilter::new("warn,clientbin=info")
        }
    });
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog = cli.catalog.as_deref();
    match cli.command {
        Commands::Scan(args) => scan::execute(catalog, &args).await,
        Commands::Download(args) => download::execute(catalog, &args).await,
        Commands::List => list::execute(catalog),
    }
}
