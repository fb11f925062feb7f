#![warn(clippy::pedantic)]
//! Discovery, Verification and Provisioning of Client Binaries
//!
//! This crate finds external command-line clients on the host, proves they work
//! by running a sanity probe, and when they are missing downloads and installs
//! them from a declarative catalog.
//!
//! ## Overview
//!
//! ```text
//! catalog.json → Catalog → supported(platform) → ClientRecord
//!                                                    │
//!              Manager::init ── locate ── sanity::verify
//!              Manager::download ── fetch → digests → unpack → alias → sanity::verify
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use clientbin::{Catalog, DownloadOptions, Manager, ScanOptions};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let manager = Manager::new(Catalog::from_path(Path::new("clients.json"))?);
//! manager.init(&ScanOptions::default()).await;
//!
//! for (id, client) in manager.clients().await {
//!     println!("{id}: available = {}", client.is_available());
//! }
//!
//! let outcome = manager
//!     .download("Geth", DownloadOptions::default().with_download_folder("/opt/clients"))
//!     .await?;
//! println!("{:?}", outcome.client.active_cli().full_path());
//! # Ok(())
//! # }
//! ```
//!
//! ## Record States
//!
//! | State | Meaning |
//! |-------|---------|
//! | none | Not verified yet |
//! | available | A candidate passed the sanity probe; `fullPath` is set |
//! | `notFound` | No candidate binary exists |
//! | `sanityCheckFail` | Candidates exist but none passed the probe |
//!
//! ## Modules
//!
//! - [`platform`] - host OS/architecture naming
//! - [`catalog`] - the catalog document and platform filtering
//! - [`record`] - runtime client records
//! - [`locator`] - candidate binary discovery
//! - [`sanity`] - concurrent sanity probes
//! - [`fetch`] - archive transport
//! - [`verify`] - archive digests
//! - [`archive`] - zip and tar extraction
//! - [`install`] - stable-name aliasing
//! - [`manager`] - the public coordinator

pub mod archive;
pub mod catalog;
pub mod errors;
pub mod fetch;
pub mod install;
pub mod locator;
pub mod logger;
pub mod manager;
pub mod pipeline;
pub mod platform;
pub mod record;
pub mod sanity;
pub mod verify;

pub use catalog::{
    Catalog, ClientEntry, DownloadDescriptor, PlatformCommands, PlatformConfig, SanityProbe,
};
pub use errors::{CatalogError, ProvisionError};
pub use fetch::{ArchiveFetcher, HttpFetcher, ProgressCallback, ProgressEvent};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use manager::{Manager, ScanOptions};
pub use pipeline::{DownloadOptions, DownloadOutcome, UNPACK_FOLDER, UnpackHandler};
pub use platform::Platform;
pub use record::{ActiveCli, ClientRecord, ClientState, FailReason};
