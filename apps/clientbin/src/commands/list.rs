//! List command for the clientbin CLI.
//!
//! Shows the clients the catalog supports on this platform without running
//! any probe.
//!
//! ## Output Format
//!
//! ```text
//! Clients for linux/x86_64:
//!   Geth     geth      (downloadable)
//!   Parity   parity
//! ```

use anyhow::Result;
use clientbin::Platform;
use std::path::Path;

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn execute(catalog: Option<&Path>) -> Result<()> {
    let catalog = super::load_catalog(catalog)?;
    let platform = Platform::current();
    let records = catalog.supported(&platform);

    if records.is_empty() {
        println!("No clients supported on {platform}.");
        return Ok(());
    }

    println!("Clients for {platform}:");
    let width = records.iter().map(|r| r.id().len()).max().unwrap_or(0);
    for record in &records {
        let config = record.config();
        let downloadable = config
            .download
            .as_ref()
            .and_then(|d| d.source())
            .is_some();
        if downloadable {
            println!("  {:width$}  {}  (downloadable)", record.id(), config.bin);
        } else {
            println!("  {:width$}  {}", record.id(), config.bin);
        }
    }
    Ok(())
}
