//! Error types for the clientbin CLI.
//!
//! Library errors travel as `anyhow::Error`; the variants here mark outcomes
//! the CLI reports with a dedicated exit code or message.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the CLI itself.
#[derive(Debug, Error)]
pub enum CliError {
    /// Neither `--catalog` nor `CLIENTBIN_CATALOG` was given.
    #[error("no catalog given: pass --catalog <FILE> or set CLIENTBIN_CATALOG")]
    MissingCatalog,

    /// The catalog file could not be loaded.
    #[error("cannot load catalog {}", path.display())]
    CatalogLoad {
        /// The catalog path.
        path: PathBuf,
    },

    /// The `--url-pattern` argument is not a valid regular expression.
    #[error("invalid URL pattern: {pattern}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
    },

    /// A download finished but the client did not pass verification.
    #[error("{id} was installed but is not usable ({reason})")]
    ClientUnavailable {
        /// The client id.
        id: String,
        /// The recorded failure reason.
        reason: &'static str,
    },
}

impl CliError {
    /// Creates a new `ClientUnavailable` error.
    #[must_use]
    pub fn client_unavailable(id: impl Into<String>, reason: &'static str) -> Self {
        Self::ClientUnavailable {
            id: id.into(),
            reason,
        }
    }
}
