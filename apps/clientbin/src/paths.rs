//! Default locations used by the CLI.
//!
//! The download directory is determined by:
//! 1. The `CLIENTBIN_HOME` environment variable if set
//! 2. `<platform data dir>/clientbin/downloads`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the download directory.
pub const CLIENTBIN_HOME_ENV: &str = "CLIENTBIN_HOME";

/// Resolves the directory downloads are placed under.
///
/// # Errors
///
/// Returns an error if no override is set and the platform data directory
/// cannot be determined.
pub fn download_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(CLIENTBIN_HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    Ok(dirs::data_dir()
        .context("Cannot determine data directory. Set CLIENTBIN_HOME environment variable.")?
        .join("clientbin")
        .join("downloads"))
}
