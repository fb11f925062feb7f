//! Client catalog document.
//!
//! The catalog is a static JSON document describing every known client and,
//! per OS and architecture, where its binary lives and how to prove it works.
//!
//! ## Catalog Format
//!
//! ```json
//! {
//!   "clients": {
//!     "Geth": {
//!       "homepage": "https://geth.ethereum.org",
//!       "version": "1.14.0",
//!       "versionNotes": "https://github.com/ethereum/go-ethereum/releases",
//!       "platforms": {
//!         "linux": {
//!           "x86_64": {
//!             "bin": "geth",
//!             "commands": {
//!               "sanity": { "args": ["version"], "output": ["Geth", "1.14.0"] }
//!             },
//!             "download": {
//!               "url": "https://example.org/geth-linux-amd64.tar.gz",
//!               "type": "tar",
//!               "sha256": "..."
//!             }
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Entries keep their document order. Fields the library does not use are ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::CatalogError;
use crate::platform::Platform;
use crate::record::ClientRecord;

/// The full catalog: client id → entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    /// Known clients in document order.
    #[serde(default)]
    pub clients: IndexMap<String, ClientEntry>,
}

/// Static description of a single client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientEntry {
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Version the catalog describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Release notes URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_notes: Option<String>,
    /// OS → architecture → platform configuration.
    #[serde(default)]
    pub platforms: IndexMap<String, IndexMap<String, PlatformConfig>>,
}

/// Per-platform configuration of a client binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Expected executable file name.
    pub bin: String,
    /// Commands used to exercise the binary.
    #[serde(default)]
    pub commands: PlatformCommands,
    /// Where to fetch the binary from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadDescriptor>,
}

/// Commands declared for a platform binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformCommands {
    /// Probe that certifies a candidate binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanity: Option<SanityProbe>,
}

/// A subprocess probe: run the binary with `args` and require every string in
/// `output` to appear somewhere in combined stdout and stderr.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SanityProbe {
    /// Arguments passed to the binary.
    #[serde(default)]
    pub args: Vec<String>,
    /// Required substrings.
    #[serde(default)]
    pub output: Vec<String>,
}

/// Archive download descriptor.
///
/// Every field is optional in the document; [`DownloadDescriptor::source`]
/// tells whether the descriptor is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadDescriptor {
    /// Archive URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Archive type, `zip` or `tar`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Binary name inside the archive, when it differs from the platform `bin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    /// Expected SHA-256 digest, lower-case hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Expected MD5 digest, lower-case hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl DownloadDescriptor {
    /// Returns `(url, type)` when both are present and non-empty.
    #[must_use]
    pub fn source(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        let kind = self.kind.as_deref().filter(|k| !k.is_empty())?;
        Some((url, kind))
    }
}

impl PlatformConfig {
    /// Creates a configuration with only a binary name.
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            commands: PlatformCommands::default(),
            download: None,
        }
    }

    /// Returns the sanity probe, if one is configured.
    #[must_use = "returns the probe without side effects"]
    pub fn sanity(&self) -> Option<&SanityProbe> {
        self.commands.sanity.as_ref()
    }

    /// Returns the file name to search for after unpacking an archive.
    #[must_use = "returns the name without side effects"]
    pub fn archive_bin(&self) -> &str {
        self.download
            .as_ref()
            .and_then(|d| d.bin.as_deref())
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.bin)
    }
}

impl ClientEntry {
    /// Returns the configuration for `platform`, if the client supports it.
    #[must_use]
    pub fn platform_config(&self, platform: &Platform) -> Option<&PlatformConfig> {
        self.platforms.get(platform.os())?.get(platform.arch())
    }
}

impl Catalog {
    /// Parses a catalog from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the document is not a valid catalog.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Returns `true` when the catalog has no clients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Builds a runtime record for every client supporting `platform`.
    ///
    /// Clients without an entry for the platform are omitted. Records come out
    /// in catalog order and carry no verification state yet.
    #[must_use]
    pub fn supported(&self, platform: &Platform) -> Vec<ClientRecord> {
        self.clients
            .iter()
            .filter_map(|(id, entry)| {
                let config = entry.platform_config(platform)?;
                Some(ClientRecord::new(id.clone(), entry, config.clone()))
            })
            .collect()
    }
}
