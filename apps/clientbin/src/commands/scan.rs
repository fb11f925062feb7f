//! Scan command for the clientbin CLI.
//!
//! Looks for every client the catalog supports on this platform, runs its
//! sanity probe and prints the records as JSON on stdout.
//!
//! ## Usage
//!
//! ```bash
//! clientbin scan
//! clientbin scan --folder /opt/tools --folder ~/bin
//! ```

use anyhow::{Context, Result};
use clap::Args;
use clientbin::ScanOptions;
use std::path::{Path, PathBuf};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Extra folder to search after the executable search path. Repeatable.
    #[clap(long = "folder", value_name = "DIR")]
    pub folders: Vec<PathBuf>,
}

/// Executes the scan command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the records cannot be
/// serialized.
pub async fn execute(catalog: Option<&Path>, args: &ScanArgs) -> Result<()> {
    let manager = super::manager(catalog)?;
    manager
        .init(&ScanOptions::with_folders(args.folders.iter().cloned()))
        .await;

    let clients = manager.clients().await;
    let json = serde_json::to_string_pretty(&clients).context("Failed to serialize clients")?;
    println!("{json}");
    Ok(())
}
