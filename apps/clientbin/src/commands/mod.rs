//! Command modules for the clientbin CLI.
//!
//! - [`scan`] - Discover and verify clients on this host
//! - [`download`] - Provision one client
//! - [`list`] - Show the clients supported on this platform

pub mod download;
pub mod list;
pub mod scan;

use anyhow::{Context, Result};
use clientbin::{Catalog, Manager, TracingLogger};
use std::path::Path;
use std::sync::Arc;

use crate::errors::CliError;

/// Loads the catalog named on the command line.
pub(crate) fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let path = path.ok_or(CliError::MissingCatalog)?;
    Catalog::from_path(path).with_context(|| CliError::CatalogLoad {
        path: path.to_path_buf(),
    })
}

/// Builds a manager over the catalog that logs through `tracing`.
pub(crate) fn manager(path: Option<&Path>) -> Result<Manager> {
    Ok(Manager::new(load_catalog(path)?).with_logger(Arc::new(TracingLogger)))
}
