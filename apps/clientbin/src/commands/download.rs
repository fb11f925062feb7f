//! Download command for the clientbin CLI.
//!
//! Provisions one client: fetches its archive, checks the declared digests,
//! unpacks it under `<dir>/<id>/unpacked` and verifies the installed binary.
//! The download outcome is printed as JSON on stdout.
//!
//! ## Usage
//!
//! ```bash
//! clientbin download Geth
//! clientbin download Geth --dir /opt/clients --url-pattern '^https://'
//! ```

use anyhow::{Context, Result};
use clap::Args;
use clientbin::{DownloadOptions, ProgressEvent, ScanOptions};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::CliError;
use crate::paths;

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Catalog id of the client to provision.
    pub id: String,

    /// Base download directory; the client id is appended.
    ///
    /// Defaults to `CLIENTBIN_HOME` or the platform data directory.
    #[clap(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Regular expression the download URL must match.
    #[clap(long, value_name = "REGEX")]
    pub url_pattern: Option<String>,
}

/// Executes the download command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the pattern is invalid,
/// provisioning fails, or the installed client does not pass verification.
pub async fn execute(catalog: Option<&Path>, args: &DownloadArgs) -> Result<()> {
    let manager = super::manager(catalog)?;
    manager.init(&ScanOptions::default()).await;

    let dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => paths::download_dir()?,
    };
    let mut options = DownloadOptions::default()
        .with_download_folder(dir)
        .with_progress(Arc::new(report_progress));
    if let Some(pattern) = &args.url_pattern {
        let regex = Regex::new(pattern).with_context(|| CliError::InvalidPattern {
            pattern: pattern.clone(),
        })?;
        options = options.with_url_regex(regex);
    }

    let outcome = manager.download(&args.id, options).await?;

    let json = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
    println!("{json}");

    if let Some(reason) = outcome.client.state().and_then(|s| s.fail_reason()) {
        return Err(CliError::client_unavailable(&args.id, reason.as_str()).into());
    }
    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn report_progress(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { url, total } if total > 0 => {
            eprintln!("Downloading {url} ({total} bytes)...");
        }
        ProgressEvent::Started { url, .. } => eprintln!("Downloading {url}..."),
        ProgressEvent::Progress { .. } => {}
        ProgressEvent::Completed => eprintln!("Download complete."),
        ProgressEvent::Failed { error } => eprintln!("Download failed: {error}"),
    }
}
