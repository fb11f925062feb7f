//! Client manager: owns the runtime records and coordinates discovery and provisioning.
//!
//! ## Operations
//!
//! - [`Manager::init`] rebuilds every record from the catalog and verifies all
//!   of them concurrently.
//! - [`Manager::download`] provisions one client and writes the updated record back.
//! - [`Manager::clients`] returns the current records.
//!
//! Downloads for the same id are serialized; downloads for different ids run
//! concurrently.
//!
//! ## Example
//!
//! ```ignore
//! let manager = Manager::new(Catalog::from_path(Path::new("clients.json"))?)
//!     .with_logger(Arc::new(TracingLogger));
//! manager.init(&ScanOptions::default()).await;
//! let outcome = manager.download("Geth", DownloadOptions::default()).await?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::errors::ProvisionError;
use crate::fetch::ArchiveFetcher;
use crate::locator;
use crate::logger::{Logger, NoopLogger};
use crate::pipeline::{DownloadOptions, DownloadOutcome, Pipeline};
use crate::platform::Platform;
use crate::record::{ClientRecord, FailReason};
use crate::sanity::{self, DEFAULT_PROBE_TIMEOUT};

/// Options for [`Manager::init`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Extra folders searched for client binaries, after the executable search path.
    pub folders: Vec<PathBuf>,
}

impl ScanOptions {
    /// Creates options searching the given extra folders.
    #[must_use]
    pub fn with_folders(folders: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            folders: folders.into_iter().collect(),
        }
    }
}

/// Owns the catalog and the runtime records derived from it.
pub struct Manager {
    catalog: Catalog,
    platform: Option<Platform>,
    logger: Arc<dyn Logger>,
    fetcher: Option<Arc<dyn ArchiveFetcher>>,
    probe_timeout: Duration,
    clients: RwLock<IndexMap<String, ClientRecord>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Manager {
    /// Creates a manager for `catalog` with a no-op logger and the HTTP fetcher.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            platform: None,
            logger: Arc::new(NoopLogger),
            fetcher: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            clients: RwLock::new(IndexMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Uses `logger` for diagnostics.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the logger; `None` restores the no-op logger.
    pub fn set_logger(&mut self, logger: Option<Arc<dyn Logger>>) {
        self.logger = logger.unwrap_or_else(|| Arc::new(NoopLogger));
    }

    /// Fetches archives through `fetcher` instead of HTTP.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Resolves catalog entries for `platform` instead of the host platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Bounds each sanity probe run.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the platform records are resolved for.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    /// Returns a snapshot of all runtime records, in catalog order.
    pub async fn clients(&self) -> IndexMap<String, ClientRecord> {
        self.clients.read().await.clone()
    }

    /// Returns the runtime record for `id`.
    pub async fn client(&self, id: &str) -> Option<ClientRecord> {
        self.clients.read().await.get(id).cloned()
    }

    /// Scans the host for every client the catalog supports on this platform.
    ///
    /// Replaces all records. Never fails: each record's state tells whether the
    /// client was found and passed its sanity probe.
    pub async fn init(&self, options: &ScanOptions) {
        self.logger.info(format_args!("Initializing..."));

        let platform = self.platform();
        self.logger.info(format_args!("Resolved platform {platform}"));

        let records = self.catalog.supported(&platform);
        self.logger.info(format_args!("{} possible clients.", records.len()));

        let verified = join_all(
            records
                .into_iter()
                .map(|record| self.check(record, &options.folders)),
        )
        .await;

        let mut clients = self.clients.write().await;
        *clients = verified
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect();
    }

    async fn check(&self, mut record: ClientRecord, folders: &[PathBuf]) -> ClientRecord {
        self.logger.info(format_args!("Checking {} availability ...", record.id()));
        record.reset();

        let bin = record.config().bin.clone();
        let candidates = locator::locate(&bin, folders, self.logger.as_ref()).await;
        if candidates.is_empty() {
            self.logger.warn(format_args!(
                "Unable to resolve {} executable: {bin}",
                record.id()
            ));
            record.mark_unavailable(FailReason::NotFound);
            return record;
        }

        sanity::verify(record, candidates, self.probe_timeout, self.logger.as_ref()).await
    }

    /// Downloads, installs and verifies the client `id`.
    ///
    /// The updated record is stored back and returned in the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has no record for this platform, its
    /// download descriptor is incomplete, the URL fails `url_regex`, the fetch
    /// fails, a digest mismatches, or unpacking fails. A binary that is missing
    /// or fails its sanity probe after unpacking is reported in the record
    /// state, not as an error.
    pub async fn download(
        &self,
        id: &str,
        options: DownloadOptions,
    ) -> Result<DownloadOutcome, ProvisionError> {
        self.logger.info(format_args!("Download binary for {id} ..."));

        let slot = self.in_flight_slot(id).await;
        let _guard = slot.lock().await;

        let record = self
            .client(id)
            .await
            .ok_or_else(|| ProvisionError::missing_configuration(id))?;

        let pipeline = Pipeline {
            fetcher: self.fetcher.as_deref(),
            logger: self.logger.as_ref(),
            probe_timeout: self.probe_timeout,
        };
        let outcome = pipeline.run(record, &options).await?;

        self.clients
            .write()
            .await
            .insert(id.to_string(), outcome.client.clone());
        Ok(outcome)
    }

    async fn in_flight_slot(&self, id: &str) -> Arc<Mutex<()>> {
        let mut slots = self.in_flight.lock().await;
        Arc::clone(slots.entry(id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::tests::InfoRecorder;
    use crate::record::ClientState;

    fn catalog(json: &str) -> Catalog {
        Catalog::from_json_str(json).expect("Should parse catalog")
    }

    #[tokio::test]
    async fn empty_catalog_yields_no_clients() {
        let manager = Manager::new(catalog(r#"{ "clients": {} }"#));
        manager.init(&ScanOptions::default()).await;
        assert!(manager.clients().await.is_empty());
    }

    #[tokio::test]
    async fn unsupported_platform_entries_are_omitted() {
        let document = r#"{ "clients": { "Maga": { "platforms": { "invalid": { "x64": {
            "bin": "maga"
        } } } } } }"#;
        let manager =
            Manager::new(catalog(document)).with_platform(Platform::new("linux", "x64"));
        manager.init(&ScanOptions::default()).await;
        assert!(manager.client("Maga").await.is_none());
    }

    #[tokio::test]
    async fn unresolvable_binary_is_not_found() {
        let manager = Manager::new(catalog(
            r#"{ "clients": { "Maga": { "platforms": { "linux": { "x64": {
                "bin": "clientbin-test-missing-binary",
                "commands": { "sanity": { "args": ["test"], "output": ["good:test"] } }
            } } } } } }"#,
        ))
        .with_platform(Platform::new("linux", "x64"));
        manager.init(&ScanOptions::default()).await;

        let record = manager.client("Maga").await.expect("Should have record");
        assert_eq!(
            record.state(),
            Some(ClientState::unavailable(FailReason::NotFound))
        );
        assert!(record.active_cli().full_path().is_none());
    }

    #[tokio::test]
    async fn download_without_record_reports_missing_configuration() {
        let manager = Manager::new(catalog(r#"{ "clients": {} }"#));
        let err = manager
            .download("Maga", DownloadOptions::default())
            .await
            .expect_err("Should fail");
        assert_eq!(err.to_string(), "Maga missing configuration for this platform.");
    }

    #[tokio::test]
    async fn logger_can_be_swapped_and_cleared() {
        let recorder = Arc::new(InfoRecorder::default());
        let mut manager = Manager::new(catalog(r#"{ "clients": {} }"#))
            .with_logger(Arc::clone(&recorder) as Arc<dyn Logger>);
        manager.init(&ScanOptions::default()).await;
        let count = recorder.lines.lock().expect("Should lock recorder").len();
        assert!(count > 0);

        manager.set_logger(None);
        manager.init(&ScanOptions::default()).await;
        assert_eq!(
            recorder.lines.lock().expect("Should lock recorder").len(),
            count
        );
    }

    #[test]
    fn platform_defaults_to_host() {
        let manager = Manager::new(Catalog::default());
        assert_eq!(manager.platform(), Platform::current());
    }
}
