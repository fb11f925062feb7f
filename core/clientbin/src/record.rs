//! Runtime records: what discovery and provisioning learned about a client.
//!
//! A [`ClientRecord`] is a plain value. Components take one in and hand an
//! updated one back; nothing shares a mutable record.
//!
//! Invariants upheld by the mutators:
//!
//! - `active_cli.full_path` is set if and only if the state is available.
//! - A fail reason is present only when the state is unavailable.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::catalog::{ClientEntry, PlatformConfig};

/// Why a client is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailReason {
    /// No candidate binary was found.
    NotFound,
    /// Candidates were found but none passed the sanity probe.
    SanityCheckFail,
}

impl FailReason {
    /// Returns the serialized name of the reason.
    #[must_use = "returns the reason name without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::SanityCheckFail => "sanityCheckFail",
        }
    }
}

/// Availability of a client on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_reason: Option<FailReason>,
}

impl ClientState {
    /// An available client.
    #[must_use]
    pub const fn available() -> Self {
        Self {
            available: true,
            fail_reason: None,
        }
    }

    /// An unavailable client and the reason why.
    #[must_use]
    pub const fn unavailable(reason: FailReason) -> Self {
        Self {
            available: false,
            fail_reason: Some(reason),
        }
    }

    /// Returns whether the client is usable.
    #[must_use = "returns availability without side effects"]
    pub const fn is_available(&self) -> bool {
        self.available
    }

    /// Returns the failure reason of an unavailable client.
    #[must_use = "returns the reason without side effects"]
    pub const fn fail_reason(&self) -> Option<FailReason> {
        self.fail_reason
    }
}

/// The platform configuration chosen for this host, plus the verified path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCli {
    #[serde(flatten)]
    config: PlatformConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_path: Option<PathBuf>,
}

impl ActiveCli {
    /// Returns the platform configuration.
    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Returns the verified binary path, set only for available clients.
    #[must_use]
    pub fn full_path(&self) -> Option<&Path> {
        self.full_path.as_deref()
    }
}

/// Per-run record of a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    id: String,
    #[serde(flatten)]
    entry: ClientEntry,
    active_cli: ActiveCli,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<ClientState>,
}

impl ClientRecord {
    /// Creates an unverified record for a catalog entry on the current platform.
    #[must_use]
    pub fn new(id: impl Into<String>, entry: &ClientEntry, config: PlatformConfig) -> Self {
        Self {
            id: id.into(),
            entry: entry.clone(),
            active_cli: ActiveCli {
                config,
                full_path: None,
            },
            state: None,
        }
    }

    /// Returns the client id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the catalog entry the record was built from.
    #[must_use]
    pub fn entry(&self) -> &ClientEntry {
        &self.entry
    }

    /// Returns the active platform configuration and verified path.
    #[must_use]
    pub fn active_cli(&self) -> &ActiveCli {
        &self.active_cli
    }

    /// Returns the platform configuration for this host.
    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.active_cli.config
    }

    /// Returns the verification state, absent until the record is verified.
    #[must_use]
    pub fn state(&self) -> Option<ClientState> {
        self.state
    }

    /// Returns `true` when the record has been verified as available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.is_some_and(|s| s.is_available())
    }

    /// Marks the client available at `path`.
    pub fn mark_available(&mut self, path: PathBuf) {
        self.active_cli.full_path = Some(path);
        self.state = Some(ClientState::available());
    }

    /// Marks the client unavailable and clears any verified path.
    pub fn mark_unavailable(&mut self, reason: FailReason) {
        self.active_cli.full_path = None;
        self.state = Some(ClientState::unavailable(reason));
    }

    /// Drops the verification outcome before a new verification pass.
    pub(crate) fn reset(&mut self) {
        self.active_cli.full_path = None;
        self.state = None;
    }
}
