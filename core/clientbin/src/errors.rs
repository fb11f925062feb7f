//! Error types for catalog loading and client provisioning.
//!
//! Discovery and verification never fail: their outcomes are recorded in
//! [`crate::record::ClientState`]. The errors here are reserved for operations a
//! caller invokes explicitly, where a failed stage must abort the whole call.
//!
//! The `Display` text of every [`ProvisionError`] variant is part of the public
//! contract; callers match on these messages.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading or parsing a client catalog document.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {}", path.display())]
    Read {
        /// The path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog document is not valid JSON of the expected shape.
    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a provisioning run for a single client.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No runtime record exists for the id on the current platform.
    #[error("{id} missing configuration for this platform.")]
    MissingConfiguration {
        /// The requested client id.
        id: String,
    },

    /// The platform entry lacks a download URL or archive type.
    #[error("Download info not available for {id}")]
    DownloadInfoUnavailable {
        /// The requested client id.
        id: String,
    },

    /// The download URL did not match the caller's pattern.
    #[error("Download URL failed regex check")]
    UrlRejected {
        /// The rejected URL.
        url: String,
    },

    /// Fetching the archive failed.
    #[error("Error downloading package for {id}: {cause}")]
    Transport {
        /// The requested client id.
        id: String,
        /// Description of the underlying transport failure.
        cause: String,
    },

    /// A declared digest did not match the downloaded archive.
    #[error("Hash mismatch (using {algo}): expected {expected}; got {actual}")]
    HashMismatch {
        /// Digest algorithm name, `sha256` or `md5`.
        algo: &'static str,
        /// Digest declared in the catalog.
        expected: String,
        /// Digest of the downloaded file.
        actual: String,
    },

    /// No built-in extractor exists for the archive type.
    #[error("Unsupported archive type: {kind}")]
    UnsupportedArchive {
        /// The archive type declared in the catalog.
        kind: String,
    },

    /// Unpacking failed. Caller-supplied handler errors are shown verbatim.
    #[error("{0:#}")]
    Unpack(anyhow::Error),

    /// A blocking helper task failed.
    #[error("{0:#}")]
    Internal(anyhow::Error),

    /// A filesystem operation in the pipeline failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    /// Creates a new `MissingConfiguration` error.
    #[must_use]
    pub fn missing_configuration(id: impl Into<String>) -> Self {
        Self::MissingConfiguration { id: id.into() }
    }

    /// Creates a new `DownloadInfoUnavailable` error.
    #[must_use]
    pub fn download_info_unavailable(id: impl Into<String>) -> Self {
        Self::DownloadInfoUnavailable { id: id.into() }
    }

    /// Creates a new `UrlRejected` error.
    #[must_use]
    pub fn url_rejected(url: impl Into<String>) -> Self {
        Self::UrlRejected { url: url.into() }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Transport {
            id: id.into(),
            cause: cause.into(),
        }
    }

    /// Creates a new `HashMismatch` error.
    #[must_use]
    pub fn hash_mismatch(
        algo: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::HashMismatch {
            algo,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `UnsupportedArchive` error.
    #[must_use]
    pub fn unsupported_archive(kind: impl Into<String>) -> Self {
        Self::UnsupportedArchive { kind: kind.into() }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}
